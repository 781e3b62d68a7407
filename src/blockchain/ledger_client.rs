// src/blockchain/ledger_client.rs
//! EVM ledger client implementation.
//!
//! Provides a high-level interface for talking to the ledger that anchors DID
//! documents and linked resources:
//! - Contract transactions signed with an explicitly supplied key
//! - Read-only contract queries
//! - Fee estimation (dry run, never mutates ledger state)
//! - Balance lookup
//!
//! Nothing here retries. A provider error or a revert is returned to the
//! caller as-is.

use crate::error::LedgerError;
use ethers::abi::{Abi, Detokenize, Token, Tokenize};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Bytes, Chain, TransactionReceipt, TransactionRequest, H256, U256, U64,
};
use ethers::utils::format_units;
use k256::ecdsa::SigningKey;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Cost estimate for a contract call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    /// `gas_limit * gas_price`, in ether units
    pub transaction_fee: String,
    pub gas_limit: U256,
    pub gas_price: U256,
    /// Human readable network name, e.g. `polygon-amoy`
    pub network: String,
    pub chain_id: u64,
    /// Contract method that was estimated
    pub method: String,
}

/// Confirmed transaction summary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    pub txn_hash: H256,
    pub block_number: Option<U64>,
    pub from: Address,
    pub to: Option<Address>,
    pub gas_used: Option<U256>,
}

impl From<TransactionReceipt> for LedgerReceipt {
    fn from(receipt: TransactionReceipt) -> Self {
        LedgerReceipt {
            txn_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            from: receipt.from,
            to: receipt.to,
            gas_used: receipt.gas_used,
        }
    }
}

/// Encodes `method(params)` as call data against `abi`.
pub fn encode_call(abi: &Abi, method: &str, params: impl Tokenize) -> Result<Bytes, LedgerError> {
    encode_tokens(abi, method, &params.into_tokens())
}

fn encode_tokens(abi: &Abi, method: &str, tokens: &[Token]) -> Result<Bytes, LedgerError> {
    let function = abi.function(method)?;
    Ok(function.encode_input(tokens)?.into())
}

/// Human readable name for a chain id.
pub fn network_name(chain_id: u64) -> String {
    Chain::try_from(chain_id)
        .map(|chain| chain.to_string())
        .unwrap_or_else(|_| format!("chain-{}", chain_id))
}

/// Ledger client shared by the DID and resource registries.
///
/// This client provides:
/// - A JSON-RPC provider over HTTP
/// - Per-call signing: every write receives the signing key it must use, there
///   is no ambient wallet
/// - Confirmation: writes resolve only once the receipt is available
#[derive(Clone, Debug)]
pub struct LedgerClient {
    /// JSON-RPC provider
    provider: Provider<Http>,
    /// Chain id reported by the node at connection time
    chain_id: u64,
}

impl LedgerClient {
    /// Connects to a ledger RPC endpoint.
    ///
    /// # Arguments
    /// * `rpc_url` - JSON-RPC endpoint URL
    ///
    /// # Errors
    /// Returns error if:
    /// - The URL cannot be parsed
    /// - The chain ID cannot be retrieved
    pub async fn new(rpc_url: &str) -> Result<Self, LedgerError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| LedgerError::Connection(format!("{}: {}", rpc_url, e)))?;
        let chain_id = provider.get_chainid().await?.as_u64();
        info!("Connected to ledger {} (chain id {})", rpc_url, chain_id);

        Ok(Self { provider, chain_id })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn network(&self) -> String {
        network_name(self.chain_id)
    }

    /// Native token balance of `address`.
    pub async fn get_balance(&self, address: Address) -> Result<U256, LedgerError> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    /// Sends a transaction to a smart contract and waits for it to be mined.
    ///
    /// # Arguments
    /// * `contract_address` - Address of the target contract
    /// * `abi` - Contract ABI
    /// * `method` - Method name to call
    /// * `params` - Method parameters
    /// * `signing_key` - Key of the submitting account
    ///
    /// # Returns
    /// - `Ok(Some(receipt))` once mined with a success status
    /// - `Ok(None)` if the node dropped the transaction
    ///
    /// # Errors
    /// Returns error if:
    /// - The method is not part of the ABI or parameters do not encode
    /// - Signing or submission fails
    /// - The transaction reverts (e.g. the signer is not the controller)
    pub async fn send_transaction(
        &self,
        contract_address: Address,
        abi: &Abi,
        method: &str,
        params: impl Tokenize,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        let data = encode_call(abi, method, params)?;

        let wallet = LocalWallet::from(signing_key.clone()).with_chain_id(self.chain_id);
        let sender = wallet.address();
        let client = SignerMiddleware::new(self.provider.clone(), wallet);

        let request = TransactionRequest::new()
            .from(sender)
            .to(contract_address)
            .data(data);

        let pending = client
            .send_transaction(request, None)
            .await
            .map_err(|e| LedgerError::Signer(e.to_string()))?;
        let tx_hash = *pending;
        debug!("Submitted {} from {:?}: {:?}", method, sender, tx_hash);

        match pending.await? {
            None => Ok(None),
            Some(receipt) if receipt.status == Some(U64::zero()) => {
                Err(LedgerError::Reverted(tx_hash))
            }
            Some(receipt) => {
                info!("{} confirmed in block {:?}", method, receipt.block_number);
                Ok(Some(receipt.into()))
            }
        }
    }

    /// Queries a smart contract (read-only operation).
    ///
    /// # Arguments
    /// * `contract_address` - Address of the target contract
    /// * `abi` - Contract ABI
    /// * `method` - Method name to call
    /// * `params` - Method parameters
    ///
    /// # Returns
    /// Decoded return value from the contract call
    pub async fn query_contract<R: Detokenize>(
        &self,
        contract_address: Address,
        abi: &Abi,
        method: &str,
        params: impl Tokenize,
    ) -> Result<R, LedgerError> {
        let data = encode_call(abi, method, params)?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(contract_address)
            .data(data)
            .into();

        let output = self.provider.call(&tx, None).await?;
        let tokens = abi.function(method)?.decode_output(output.as_ref())?;

        R::from_tokens(tokens).map_err(|e| LedgerError::Decode(e.to_string()))
    }

    /// Estimates the cost of a contract call without sending it.
    ///
    /// # Arguments
    /// * `contract_address` - Address of the target contract
    /// * `abi` - Contract ABI
    /// * `method` - Method name to estimate
    /// * `args` - Method arguments as ABI tokens
    /// * `from` - Account the call would be sent from (owner-gated methods revert otherwise)
    pub async fn estimate_fee(
        &self,
        contract_address: Address,
        abi: &Abi,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<FeeEstimate, LedgerError> {
        let data = encode_tokens(abi, method, args)?;
        let mut request = TransactionRequest::new().to(contract_address).data(data);
        if let Some(from) = from {
            request = request.from(from);
        }
        let tx: TypedTransaction = request.into();

        let (gas_limit, gas_price) = futures::try_join!(
            self.provider.estimate_gas(&tx, None),
            self.provider.get_gas_price()
        )?;

        let transaction_fee = format_units(gas_limit * gas_price, "ether")
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        Ok(FeeEstimate {
            transaction_fee,
            gas_limit,
            gas_price,
            network: self.network(),
            chain_id: self.chain_id,
            method: method.to_string(),
        })
    }
}
