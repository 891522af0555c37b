use super::super::*;

impl<'a, S: State> Layer<'a, S> {
    // === Balance Handlers ===

    pub(in crate::layer) fn handle_debit(
        &mut self,
        ctx: &mut Context<'_>,
        from: Address,
        to: Address,
        amount: u64,
    ) -> Result<(), EngineError> {
        if from.is_reserved() {
            return Err(invariant(format!("cannot debit reserved address {from}")));
        }
        if from == to {
            return Err(invariant("cannot debit to self"));
        }
        if to.is_null() {
            return Err(invariant("cannot debit to the null address"));
        }

        let mut register = self.load_prestate(ctx, &from)?;
        require_owner(&register, &ctx.caller)?;
        let mut account = as_account(&register)?;

        let recipient = if to.is_wildcard() {
            if !ctx.contract.has_conditions() {
                return Err(invariant("debit to the wildcard requires conditions"));
            }
            None
        } else {
            let target = self
                .read_register(&to)?
                .ok_or_else(|| invariant(format!("debit recipient {to} does not exist")))?;
            Some(target.owner)
        };

        let balance = account.get_u64("balance")?;
        if amount > balance {
            return Err(invariant(format!("insufficient balance: {balance} < {amount}")));
        }
        account.set_u64("balance", balance - amount)?;
        register.set_object(&account);

        self.commit_poststate(ctx, &from, register)?;
        if let Some(owner) = recipient {
            self.write_event(&owner, ctx.txid)?;
        }
        Ok(())
    }

    /// Settle a DEBIT into `to`.
    ///
    /// Three paths exist: the recipient credits the debited amount, the sender returns it to
    /// the source once the debit condition fails, or a holder of the token owning a RAW or
    /// READONLY recipient credits its share.
    pub(in crate::layer) fn handle_credit(
        &mut self,
        ctx: &mut Context<'_>,
        txid: Digest,
        index: u32,
        to: Address,
        proof: Address,
        amount: u64,
    ) -> Result<(), EngineError> {
        let referenced = self.read_contract(&txid, index)?;
        let Primitive::Debit {
            from,
            to: debited,
            amount: debit_amount,
        } = *referenced.contract.primitive()
        else {
            return Err(invariant("credited contract is not a debit"));
        };

        let mut register = self.load_prestate(ctx, &to)?;
        require_owner(&register, &ctx.caller)?;
        let mut account = as_account(&register)?;

        if self.has_proof(&proof, &txid, index)? {
            return Err(invariant("debit already credited"));
        }
        let outcome = self.evaluate(&referenced, ctx)?;

        let credit = if to == from {
            if ctx.caller != referenced.caller || outcome != Some(false) {
                return Err(unauthorized(
                    "only the sender may return a debit whose condition failed",
                ));
            }
            if proof != from {
                return Err(invariant("return proof must be the debit source"));
            }
            debit_amount
        } else if to == debited || debited.is_wildcard() {
            if outcome == Some(false) {
                return Err(unauthorized("debit conditions not satisfied"));
            }
            if proof != from {
                return Err(invariant("credit proof must be the debit source"));
            }
            debit_amount
        } else {
            if outcome == Some(false) {
                return Err(unauthorized("debit conditions not satisfied"));
            }
            self.split_share(ctx, &debited, &proof, debit_amount)?
        };
        if amount != credit {
            return Err(invariant(format!(
                "credit amount {amount} does not match {credit}"
            )));
        }

        let source = self
            .read_register(&from)?
            .ok_or_else(|| invariant(format!("debit source {from} does not exist")))?;
        if as_account(&source)?.get_address("token")? != account.get_address("token")? {
            return Err(invariant("credit token does not match the debit"));
        }

        let balance = account
            .get_u64("balance")?
            .checked_add(credit)
            .ok_or_else(|| invariant("balance overflow"))?;
        account.set_u64("balance", balance)?;
        register.set_object(&account);

        self.commit_poststate(ctx, &to, register)?;
        self.write_proof(&proof, &txid, index);
        Ok(())
    }

    /// Share of a debit to a token-owned register that `proof` entitles the caller to.
    fn split_share(
        &self,
        ctx: &Context<'_>,
        debited: &Address,
        proof: &Address,
        amount: u64,
    ) -> Result<u64, EngineError> {
        let target = self
            .read_register(debited)?
            .ok_or_else(|| invariant(format!("debit recipient {debited} does not exist")))?;
        if !matches!(target.kind, Kind::Raw | Kind::Readonly) {
            return Err(invariant("credit target does not match the debit"));
        }

        let token = self
            .read_register(&target.owner)?
            .ok_or_else(|| invariant("split payment recipient is not owned by a token"))?
            .object()?;
        if token.standard() != Standard::Token {
            return Err(invariant("split payment recipient is not owned by a token"));
        }
        let supply = token.get_u64("supply")?;
        if supply == 0 {
            return Err(invariant("token has no supply"));
        }

        let holder = self
            .read_register(proof)?
            .ok_or_else(|| invariant(format!("proof account {proof} does not exist")))?;
        require_owner(&holder, &ctx.caller)?;
        let holding = as_account(&holder)?;
        if holding.get_address("token")? != target.owner {
            return Err(invariant("proof account does not hold the token"));
        }

        let share = holding.get_u64("balance")? as u128 * amount as u128 / supply as u128;
        u64::try_from(share).map_err(|_| invariant("split share overflow"))
    }

    pub(in crate::layer) fn handle_fee(
        &mut self,
        ctx: &mut Context<'_>,
        address: Address,
        amount: u64,
    ) -> Result<(), EngineError> {
        let mut register = self.load_prestate(ctx, &address)?;
        require_owner(&register, &ctx.caller)?;
        let mut account = as_account(&register)?;
        if !account.get_address("token")?.is_null() {
            return Err(invariant("fees are paid in the native token"));
        }

        let balance = account.get_u64("balance")?;
        if amount > balance {
            return Err(invariant(format!(
                "insufficient balance for fee: {balance} < {amount}"
            )));
        }
        account.set_u64("balance", balance - amount)?;
        register.set_object(&account);

        self.commit_poststate(ctx, &address, register)
    }
}
