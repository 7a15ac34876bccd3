use super::State;
use ethereum_types::{Address, U256};
use std::collections::BTreeMap;
use std::fmt::Write;

enum Provenance {
    Committed,
    Cached,
    Dead,
}

impl State {
    /// Render every account, committed and cached, one line each. Dirty
    /// entries are tagged so a reader can tell the pending block's work
    /// from the persisted state.
    pub fn dump(&self) -> String {
        let mut rows: BTreeMap<Address, (U256, U256, bool, Provenance)> =
            BTreeMap::new();
        if let Ok(entries) = self.storage.entries_at(&self.root) {
            for (key, value) in entries {
                if key.len() != 20 {
                    continue;
                }
                if let Ok(account) =
                    ::rlp::decode::<primitives::Account>(&value)
                {
                    rows.insert(
                        Address::from_slice(&key),
                        (
                            account.balance,
                            account.nonce,
                            account.is_contract(),
                            Provenance::Committed,
                        ),
                    );
                }
            }
        }
        for (address, entry) in self.cache.borrow().iter() {
            let provenance = if entry.alive {
                Provenance::Cached
            } else {
                Provenance::Dead
            };
            rows.insert(
                *address,
                (entry.balance, entry.nonce, entry.is_contract(), provenance),
            );
        }

        let mut out = String::new();
        let _ = writeln!(out, "state root: {:?}", self.root);
        for (address, (balance, nonce, contract, provenance)) in &rows {
            let tag = match provenance {
                Provenance::Committed => "[    ]",
                Provenance::Cached => "[ *  ]",
                Provenance::Dead => "[XXX ]",
            };
            let _ = write!(out, "{} {:?}: {}@{}", tag, address, nonce, balance);
            if *contract {
                let _ = write!(out, " (contract)");
            }
            let _ = writeln!(out);
        }
        out
    }
}
