//! The set of per-question ledgers an edge node keeps.

use crate::{LedgerConfig, LedgerError, VoteLedger};
use edgevote_store::VoteStore;
use edgevote_types::{ElectionId, QuestionId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ledgers keyed by `(election, question)`, created on first use with a
/// shared configuration and overflow store.
pub struct LedgerRegistry {
    config: LedgerConfig,
    store: Option<Arc<dyn VoteStore>>,
    ledgers: BTreeMap<(ElectionId, QuestionId), VoteLedger>,
}

impl LedgerRegistry {
    pub fn new(config: LedgerConfig, store: Option<Arc<dyn VoteStore>>) -> Result<Self, LedgerError> {
        if config.memory_entry_limit.is_some() && store.is_none() {
            return Err(LedgerError::Config(
                "memory_entry_limit requires an overflow store".into(),
            ));
        }
        Ok(Self {
            config,
            store,
            ledgers: BTreeMap::new(),
        })
    }

    /// The ledger for `(election, question)`, created if absent.
    pub fn ledger_mut(
        &mut self,
        election_id: &ElectionId,
        question_id: &QuestionId,
    ) -> Result<&mut VoteLedger, LedgerError> {
        let key = (election_id.clone(), question_id.clone());
        if !self.ledgers.contains_key(&key) {
            let ledger = VoteLedger::with_config(
                election_id.clone(),
                question_id.clone(),
                &self.config,
                self.store.clone(),
            )?;
            self.ledgers.insert(key.clone(), ledger);
        }
        self.ledgers
            .get_mut(&key)
            .ok_or_else(|| LedgerError::Config(format!("ledger {election_id}/{question_id} vanished")))
    }

    pub fn get(&self, election_id: &ElectionId, question_id: &QuestionId) -> Option<&VoteLedger> {
        self.ledgers.get(&(election_id.clone(), question_id.clone()))
    }

    /// Ledgers of one election, ordered by question id.
    pub fn election_ledgers<'a>(
        &'a self,
        election_id: &'a ElectionId,
    ) -> impl Iterator<Item = &'a VoteLedger> + 'a {
        self.ledgers
            .iter()
            .filter(move |((e, _), _)| e == election_id)
            .map(|(_, ledger)| ledger)
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }
}

impl std::fmt::Debug for LedgerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerRegistry")
            .field("config", &self.config)
            .field("ledgers", &self.ledgers.len())
            .finish()
    }
}
