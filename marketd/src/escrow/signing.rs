//! Signature completeness contract
//!
//! Every signing step in the escrow protocol expects a specific
//! completeness: the buyer's lock broadcast and final release must be fully
//! signed, the seller's first release half must not be. Broadcasting a
//! fully-signed transaction at the wrong step would hand over the funds, so
//! a completeness mismatch is fatal to the protocol step.

use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};
use crate::wallet::{SignedTransaction, WalletRpc};

/// Signing issues tolerated when a *partial* signature is expected: the
/// wallet cannot sign the counterparty's input because it does not hold the
/// key, which is exactly the 2-of-2 situation
const TOLERATED_PARTIAL_ERRORS: &[&str] = &[
    "Unable to sign input, invalid stack size (possibly missing key)",
    "Operation not valid with the current stack size",
];

/// Sign a raw transaction and enforce the expected completeness
///
/// - outright signing failure → [`ProtocolError::TransactionSigningError`]
/// - complete expected, partial produced → [`ProtocolError::IncompleteSignature`]
/// - partial expected, complete produced → [`ProtocolError::UnexpectedCompleteSignature`]
pub async fn sign_rawtx(
    wallet: &dyn WalletRpc,
    hex: &str,
    expect_complete: bool,
) -> ProtocolResult<SignedTransaction> {
    let signed = wallet
        .sign_raw_transaction(hex)
        .await
        .map_err(|e| ProtocolError::TransactionSigningError(e.to_string()))?;

    if !signed.errors.is_empty() {
        let tolerable = !expect_complete
            && signed
                .errors
                .iter()
                .all(|issue| TOLERATED_PARTIAL_ERRORS.contains(&issue.error.as_str()));
        if tolerable {
            debug!(
                issues = signed.errors.len(),
                "tolerating missing-key signing issues on partial signature"
            );
        } else {
            let detail = signed
                .errors
                .iter()
                .map(|issue| issue.error.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProtocolError::TransactionSigningError(detail));
        }
    }

    match (expect_complete, signed.complete) {
        (true, false) => Err(ProtocolError::IncompleteSignature),
        (false, true) => Err(ProtocolError::UnexpectedCompleteSignature),
        _ => Ok(signed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{
        DecodedTransaction, SigningIssue, TxInput, UnspentOutput, WalletError,
    };
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    /// Wallet stub returning a canned signing result
    struct SignStub {
        result: Result<SignedTransaction, String>,
    }

    #[async_trait]
    impl WalletRpc for SignStub {
        async fn list_unspent(
            &self,
            _: u32,
            _: u32,
            _: &[String],
            _: bool,
        ) -> Result<Vec<UnspentOutput>, WalletError> {
            unimplemented!()
        }
        async fn add_multisig_address(
            &self,
            _: u32,
            _: &[String],
            _: &str,
        ) -> Result<String, WalletError> {
            unimplemented!()
        }
        async fn sign_raw_transaction(&self, _: &str) -> Result<SignedTransaction, WalletError> {
            self.result.clone().map_err(|message| WalletError::Rpc {
                code: -1,
                message,
            })
        }
        async fn send_raw_transaction(&self, _: &str) -> Result<String, WalletError> {
            unimplemented!()
        }
        async fn decode_raw_transaction(&self, _: &str) -> Result<DecodedTransaction, WalletError> {
            unimplemented!()
        }
        async fn create_raw_transaction(
            &self,
            _: &[TxInput],
            _: &BTreeMap<String, f64>,
        ) -> Result<String, WalletError> {
            unimplemented!()
        }
        async fn get_raw_transaction(&self, _: &str) -> Result<String, WalletError> {
            unimplemented!()
        }
        async fn get_new_address(&self, _: &[String], _: bool) -> Result<String, WalletError> {
            unimplemented!()
        }
    }

    fn signed(complete: bool, errors: &[&str]) -> SignedTransaction {
        SignedTransaction {
            hex: "cafe".to_string(),
            complete,
            errors: errors
                .iter()
                .map(|e| SigningIssue {
                    txid: None,
                    vout: None,
                    error: e.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_complete_as_expected() {
        let stub = SignStub { result: Ok(signed(true, &[])) };
        let result = sign_rawtx(&stub, "00", true).await.unwrap();
        assert!(result.complete);
    }

    #[tokio::test]
    async fn test_partial_as_expected_with_tolerated_errors() {
        let stub = SignStub {
            result: Ok(signed(false, &[TOLERATED_PARTIAL_ERRORS[0]])),
        };
        let result = sign_rawtx(&stub, "00", false).await.unwrap();
        assert!(!result.complete);
    }

    #[tokio::test]
    async fn test_incomplete_when_complete_required() {
        let stub = SignStub { result: Ok(signed(false, &[])) };
        let err = sign_rawtx(&stub, "00", true).await.unwrap_err();
        assert!(matches!(err, ProtocolError::IncompleteSignature));
    }

    #[tokio::test]
    async fn test_unexpected_complete() {
        let stub = SignStub { result: Ok(signed(true, &[])) };
        let err = sign_rawtx(&stub, "00", false).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedCompleteSignature));
    }

    #[tokio::test]
    async fn test_missing_key_not_tolerated_when_complete_expected() {
        let stub = SignStub {
            result: Ok(signed(true, &[TOLERATED_PARTIAL_ERRORS[0]])),
        };
        let err = sign_rawtx(&stub, "00", true).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TransactionSigningError(_)));
    }

    #[tokio::test]
    async fn test_unknown_signing_error_aborts() {
        let stub = SignStub {
            result: Ok(signed(false, &["Input not found or already spent"])),
        };
        let err = sign_rawtx(&stub, "00", false).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TransactionSigningError(_)));
    }

    #[tokio::test]
    async fn test_rpc_failure_maps_to_signing_error() {
        let stub = SignStub {
            result: Err("wallet locked".to_string()),
        };
        let err = sign_rawtx(&stub, "00", true).await.unwrap_err();
        match err {
            ProtocolError::TransactionSigningError(msg) => assert!(msg.contains("wallet locked")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
