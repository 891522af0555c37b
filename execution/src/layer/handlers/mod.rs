mod finance;
mod register;
mod rollback;
mod staking;
mod transfer;
