use super::super::*;

impl<'a, S: State> Layer<'a, S> {
    // === Rollback ===

    /// Undo `transaction`, the latest one executed by its signer.
    ///
    /// Contracts are reverted last to first: each register must still hold the contract's
    /// post-state and gets its captured pre-state back. Proofs, trust indexes and events the
    /// transaction added are removed and the signer's nonce is restored. A rejected transaction
    /// only gives its nonce back.
    pub fn rollback(&mut self, transaction: &Transaction) -> Result<(), EngineError> {
        let result = self.revert(transaction);
        match &result {
            Ok(()) => self.pending.append(&mut self.staged),
            Err(err) => {
                self.staged.clear();
                warn!(txid = ?transaction.digest(), reason = %err, "rollback failed");
            }
        }
        result
    }

    fn revert(&mut self, transaction: &Transaction) -> Result<(), EngineError> {
        let txid = transaction.digest();
        let caller = transaction.genesis(self.config.network.genesis_tag());

        let key = Key::Nonce(transaction.public.clone());
        let current = match self.get(&key)? {
            Some(Value::Nonce(nonce)) => nonce,
            _ => 0,
        };
        if current != transaction.nonce.saturating_add(1) {
            return Err(invariant(format!(
                "only the latest transaction can be rolled back (nonce {current}, got {})",
                transaction.nonce
            )));
        }
        match transaction.nonce {
            0 => self.delete(key),
            nonce => self.insert(key, Value::Nonce(nonce)),
        }

        if self.get(&Key::Transaction(txid))?.is_none() {
            debug!(?txid, "rolled back rejected transaction");
            return Ok(());
        }
        self.delete(Key::Transaction(txid));

        for contract in transaction.contracts.iter().rev() {
            self.revert_contract(&caller, &txid, contract)?;
        }
        debug!(?txid, contracts = transaction.contracts.len(), "rolled back transaction");
        Ok(())
    }

    fn revert_contract(
        &mut self,
        caller: &Address,
        txid: &Digest,
        contract: &Contract,
    ) -> Result<(), EngineError> {
        let address = match contract.primitive() {
            Primitive::Write { address, .. }
            | Primitive::Append { address, .. }
            | Primitive::Create { address, .. }
            | Primitive::Transfer { address, .. }
            | Primitive::Claim { address, .. }
            | Primitive::Genesis { address } => *address,
            Primitive::Fee { account, .. } => *account,
            Primitive::Debit { from, .. } => *from,
            Primitive::Credit { to, .. } => *to,
            Primitive::Trust { .. } | Primitive::Stake { .. } | Primitive::Unstake { .. } => {
                Address::trust(caller)
            }
        };

        let register = self
            .read_register(&address)?
            .ok_or_else(|| consistency(format!("register {address} no longer exists")))?;
        if contract.postcheck != Some(register.checksum) {
            return Err(consistency(format!(
                "register {address} changed since the transaction"
            )));
        }

        match contract.primitive() {
            Primitive::Create { .. } => self.delete(Key::Register(address)),
            _ => {
                let prestate = contract
                    .prestate
                    .clone()
                    .ok_or_else(|| malformed("missing pre-state"))?;
                self.write_register(&address, prestate);
            }
        }

        match contract.primitive() {
            Primitive::Credit {
                txid: debit,
                contract: index,
                proof,
                ..
            } => self.delete(Key::Proof {
                proof: *proof,
                txid: *debit,
                contract: *index,
            }),
            Primitive::Claim {
                txid: transfer,
                contract: index,
                address,
            } => self.delete(Key::Proof {
                proof: *address,
                txid: *transfer,
                contract: *index,
            }),
            Primitive::Genesis { .. } => self.delete(Key::Trust(*caller)),
            Primitive::Debit { to, .. } if !to.is_wildcard() => {
                let target = self
                    .read_register(to)?
                    .ok_or_else(|| consistency(format!("debit recipient {to} no longer exists")))?;
                self.remove_event(&target.owner, txid)?;
            }
            Primitive::Transfer { recipient, .. } if !recipient.is_wildcard() => {
                self.remove_event(recipient, txid)?;
            }
            _ => {}
        }
        Ok(())
    }
}
