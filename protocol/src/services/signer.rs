//! Signature collection.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use crate::crypto::{Keypair, PublicKey};
use crate::transaction::{sign_transaction, TransactionSignature, TxId};

/// A signer's answer to a signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureResponse {
    Signed(TransactionSignature),
    Declined(String),
}

/// Asks the holder of a key to sign a transition digest.
#[async_trait]
pub trait SignatureAuthority: Send + Sync {
    async fn request_signature(&self, signer: &PublicKey, tx_id: &TxId) -> SignatureResponse;
}

/// In-process signer holding keypairs for any number of parties.
///
/// Keys can be told to refuse, which is how tests and the node's dry-run
/// mode exercise the declined path.
#[derive(Default)]
pub struct LocalKeyStore {
    keys: RwLock<HashMap<PublicKey, Keypair>>,
    refusals: RwLock<HashMap<PublicKey, String>>,
}

impl LocalKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, keypair: Keypair) -> PublicKey {
        let public = keypair.public_key();
        self.keys.write().insert(public, keypair);
        public
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys.read().contains_key(key)
    }

    /// Makes `key` decline every request with `reason` until [`Self::comply`].
    pub fn refuse(&self, key: PublicKey, reason: impl Into<String>) {
        self.refusals.write().insert(key, reason.into());
    }

    pub fn comply(&self, key: &PublicKey) {
        self.refusals.write().remove(key);
    }
}

#[async_trait]
impl SignatureAuthority for LocalKeyStore {
    async fn request_signature(&self, signer: &PublicKey, tx_id: &TxId) -> SignatureResponse {
        if let Some(reason) = self.refusals.read().get(signer) {
            debug!(%signer, %tx_id, %reason, "signature declined");
            return SignatureResponse::Declined(reason.clone());
        }
        match self.keys.read().get(signer) {
            Some(keypair) => SignatureResponse::Signed(sign_transaction(tx_id, keypair)),
            None => SignatureResponse::Declined(format!("no key held for {}", signer)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signs_with_held_key() {
        let store = LocalKeyStore::new();
        let key = store.insert(Keypair::generate());
        let tx_id = TxId::from_bytes([3u8; 32]);

        match store.request_signature(&key, &tx_id).await {
            SignatureResponse::Signed(sig) => {
                assert_eq!(sig.by, key);
                assert!(sig.is_valid_for(&tx_id));
            }
            other => panic!("expected a signature, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn declines_unknown_keys() {
        let store = LocalKeyStore::new();
        let stranger = Keypair::generate().public_key();
        assert!(matches!(
            store.request_signature(&stranger, &TxId::from_bytes([0u8; 32])).await,
            SignatureResponse::Declined(_)
        ));
    }

    #[tokio::test]
    async fn refusal_can_be_lifted() {
        let store = LocalKeyStore::new();
        let key = store.insert(Keypair::generate());
        let tx_id = TxId::from_bytes([1u8; 32]);

        store.refuse(key, "not today");
        assert_eq!(
            store.request_signature(&key, &tx_id).await,
            SignatureResponse::Declined("not today".into())
        );

        store.comply(&key);
        assert!(matches!(
            store.request_signature(&key, &tx_id).await,
            SignatureResponse::Signed(_)
        ));
    }
}
