use super::super::*;

impl<'a, S: State> Layer<'a, S> {
    // === Trust Handlers ===

    /// Load the caller's indexed trust account.
    fn load_trust(&mut self, ctx: &mut Context<'_>) -> Result<(Register, Object), EngineError> {
        if !self.has_trust(&ctx.caller)? {
            return Err(invariant("caller has no trust key"));
        }
        let address = Address::trust(&ctx.caller);
        let register = self.load_prestate(ctx, &address)?;
        require_owner(&register, &ctx.caller)?;
        let account = register.object()?;
        if account.standard() != Standard::Trust {
            return Err(invariant("register is not a trust account"));
        }
        Ok((register, account))
    }

    /// Activate a trust account: its whole balance becomes the initial stake.
    pub(in crate::layer) fn handle_genesis(
        &mut self,
        ctx: &mut Context<'_>,
        address: Address,
    ) -> Result<(), EngineError> {
        if address.is_reserved() {
            return Err(invariant(format!("cannot use reserved address {address}")));
        }
        let mut register = self.load_prestate(ctx, &address)?;
        require_owner(&register, &ctx.caller)?;
        let mut account = register.object()?;
        if account.standard() != Standard::Trust {
            return Err(invariant("genesis requires a trust account"));
        }
        if self.has_trust(&ctx.caller)? {
            return Err(invariant("trust key already indexed"));
        }
        if account.get_u64("trust")? != 0 || account.get_u64("stake")? != 0 {
            return Err(invariant("trust account is already active"));
        }
        let balance = account.get_u64("balance")?;
        if balance == 0 {
            return Err(invariant("genesis requires a balance"));
        }

        account.set_u64("stake", balance)?;
        account.set_u64("balance", 0)?;
        register.set_object(&account);

        self.commit_poststate(ctx, &address, register)?;
        self.index_trust(&ctx.caller, &address);
        Ok(())
    }

    /// Update the trust score for the time since the last update and pay `reward`.
    pub(in crate::layer) fn handle_trust(
        &mut self,
        ctx: &mut Context<'_>,
        reward: u64,
    ) -> Result<(), EngineError> {
        let (mut register, mut account) = self.load_trust(ctx)?;

        let timespan = ctx
            .timestamp
            .checked_sub(register.modified)
            .ok_or_else(|| invariant("timestamp precedes the last trust update"))?;
        let limit = self.config.network.trust_timespan();
        let trust = account.get_u64("trust")?;
        let trust = if timespan < limit {
            trust.saturating_add(timespan)
        } else {
            trust.saturating_sub((timespan - limit).saturating_mul(3))
        };
        account.set_u64("trust", trust.min(self.config.network.trust_max()))?;

        let balance = account
            .get_u64("balance")?
            .checked_add(reward)
            .ok_or_else(|| invariant("balance overflow"))?;
        account.set_u64("balance", balance)?;
        register.set_object(&account);

        let address = Address::trust(&ctx.caller);
        self.commit_poststate(ctx, &address, register)
    }

    pub(in crate::layer) fn handle_stake(
        &mut self,
        ctx: &mut Context<'_>,
        amount: u64,
    ) -> Result<(), EngineError> {
        let (mut register, mut account) = self.load_trust(ctx)?;

        let balance = account.get_u64("balance")?;
        if amount > balance {
            return Err(invariant(format!(
                "insufficient balance to stake: {balance} < {amount}"
            )));
        }
        let stake = account
            .get_u64("stake")?
            .checked_add(amount)
            .ok_or_else(|| invariant("stake overflow"))?;
        account.set_u64("balance", balance - amount)?;
        account.set_u64("stake", stake)?;
        register.set_object(&account);

        let address = Address::trust(&ctx.caller);
        self.commit_poststate(ctx, &address, register)
    }

    /// Move stake back to the balance. Trust drops in proportion to the stake removed.
    pub(in crate::layer) fn handle_unstake(
        &mut self,
        ctx: &mut Context<'_>,
        amount: u64,
    ) -> Result<(), EngineError> {
        let (mut register, mut account) = self.load_trust(ctx)?;

        let stake = account.get_u64("stake")?;
        if amount > stake {
            return Err(invariant(format!("insufficient stake: {stake} < {amount}")));
        }
        let trust = account.get_u64("trust")?;
        let penalty = match stake {
            0 => 0,
            // amount <= stake keeps the quotient within trust.
            _ => (trust as u128 * amount as u128 / stake as u128) as u64,
        };
        let balance = account
            .get_u64("balance")?
            .checked_add(amount)
            .ok_or_else(|| invariant("balance overflow"))?;

        account.set_u64("trust", trust - penalty)?;
        account.set_u64("stake", stake - amount)?;
        account.set_u64("balance", balance)?;
        register.set_object(&account);

        let address = Address::trust(&ctx.caller);
        self.commit_poststate(ctx, &address, register)
    }
}
