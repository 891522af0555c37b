use super::super::*;

impl<'a, S: State> Layer<'a, S> {
    // === Ownership Handlers ===

    pub(in crate::layer) fn handle_transfer(
        &mut self,
        ctx: &mut Context<'_>,
        address: Address,
        recipient: Address,
    ) -> Result<(), EngineError> {
        if address.is_reserved() {
            return Err(invariant(format!("cannot transfer reserved address {address}")));
        }
        if address.is_trust() {
            return Err(invariant("trust accounts cannot be transferred"));
        }
        let mut register = self.load_prestate(ctx, &address)?;
        require_owner(&register, &ctx.caller)?;

        if recipient == ctx.caller {
            return Err(invariant("cannot transfer to self"));
        }
        if recipient.is_null() {
            return Err(invariant("cannot transfer to the null address"));
        }
        if register.is_object() && register.object()?.standard() == Standard::Trust {
            return Err(invariant("trust accounts cannot be transferred"));
        }
        if recipient.is_wildcard() && !ctx.contract.has_conditions() {
            return Err(invariant("transfer to the wildcard requires conditions"));
        }

        register.owner = recipient;
        self.commit_poststate(ctx, &address, register)?;
        if !recipient.is_wildcard() {
            self.write_event(&recipient, ctx.txid)?;
        }
        Ok(())
    }

    /// Take ownership of a register moved by a TRANSFER.
    ///
    /// The recipient claims while the transfer condition holds (or when there is none). The
    /// sender reclaims once the condition fails.
    pub(in crate::layer) fn handle_claim(
        &mut self,
        ctx: &mut Context<'_>,
        txid: Digest,
        index: u32,
        address: Address,
    ) -> Result<(), EngineError> {
        let referenced = self.read_contract(&txid, index)?;
        let Primitive::Transfer {
            address: transferred,
            recipient,
        } = *referenced.contract.primitive()
        else {
            return Err(invariant("claimed contract is not a transfer"));
        };
        if transferred != address {
            return Err(invariant("claimed address does not match the transfer"));
        }
        if self.has_proof(&address, &txid, index)? {
            return Err(invariant("transfer already claimed"));
        }

        let mut register = self.load_prestate(ctx, &address)?;
        if register.owner != recipient {
            return Err(invariant("register is no longer held by the transfer"));
        }

        let outcome = self.evaluate(&referenced, ctx)?;
        let receiving = ctx.caller == recipient || recipient.is_wildcard();
        let returning = ctx.caller == referenced.caller && outcome == Some(false);
        if !(receiving && outcome != Some(false)) && !returning {
            return Err(unauthorized("claim conditions not satisfied"));
        }

        register.owner = ctx.caller;
        self.commit_poststate(ctx, &address, register)?;
        self.write_proof(&address, &txid, index);
        Ok(())
    }
}
