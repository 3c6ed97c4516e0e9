//! RPC trait definitions.
//!
//! Method names are the full dotted identifiers from the wire contract;
//! the traits are merged into one module at server start.

use jsonrpsee::core::{RpcResult, SubscriptionResult};
use jsonrpsee::proc_macros::rpc;

use crate::types::{
    BlockOpts, JobFilter, ProviderFilter, RpcBeacon, RpcBlob, RpcBlobInfo, RpcBlock, RpcDaProof,
    RpcHead, RpcJob, RpcProvider, RpcReceipt, RpcRound, RpcTx,
};

#[rpc(server)]
pub trait TxApi {
    /// Submit a canonical CBOR signed envelope as 0x-hex. Returns the
    /// transaction hash.
    #[method(name = "tx.sendRawTransaction")]
    async fn send_raw_transaction(&self, raw_cbor_hex: String) -> RpcResult<String>;

    #[method(name = "tx.getTransactionReceipt")]
    async fn get_transaction_receipt(&self, tx_hash: String) -> RpcResult<Option<RpcReceipt>>;

    #[method(name = "tx.getTransactionByHash")]
    async fn get_transaction_by_hash(&self, tx_hash: String) -> RpcResult<Option<RpcTx>>;
}

#[rpc(server)]
pub trait ChainApi {
    #[method(name = "chain.getHead")]
    async fn get_head(&self) -> RpcResult<Option<RpcHead>>;

    /// The pinned network parameters as JSON.
    #[method(name = "chain.getParams")]
    async fn get_params(&self) -> RpcResult<serde_json::Value>;

    #[method(name = "chain.getChainId")]
    async fn get_chain_id(&self) -> RpcResult<u64>;

    #[method(name = "chain.getBlockByNumber")]
    async fn get_block_by_number(
        &self,
        height: u64,
        opts: Option<BlockOpts>,
    ) -> RpcResult<Option<RpcBlock>>;

    #[method(name = "chain.getBlockByHash")]
    async fn get_block_by_hash(
        &self,
        hash: String,
        opts: Option<BlockOpts>,
    ) -> RpcResult<Option<RpcBlock>>;
}

#[rpc(server)]
pub trait StateApi {
    /// Balance as a decimal string.
    #[method(name = "state.getBalance")]
    async fn get_balance(&self, address: String) -> RpcResult<String>;

    #[method(name = "state.getNonce")]
    async fn get_nonce(&self, address: String) -> RpcResult<u64>;
}

#[rpc(server)]
pub trait DaApi {
    /// Store a blob: namespace as hex (pinned width), data as base64.
    #[method(name = "da.putBlob")]
    async fn put_blob(&self, namespace_hex: String, data_b64: String) -> RpcResult<RpcBlobInfo>;

    #[method(name = "da.getBlob")]
    async fn get_blob(&self, commitment: String) -> RpcResult<Option<RpcBlob>>;

    /// Sampled inclusion proofs against a blob commitment.
    #[method(name = "da.getProof")]
    async fn get_proof(&self, commitment: String, samples: u32) -> RpcResult<RpcDaProof>;
}

#[rpc(server)]
pub trait RandApi {
    #[method(name = "rand.getParams")]
    async fn get_params(&self) -> RpcResult<serde_json::Value>;

    #[method(name = "rand.getRound")]
    async fn get_round(&self) -> RpcResult<RpcRound>;

    /// Publish a commitment: both params are 0x-hex 32-byte hashes.
    #[method(name = "rand.commit")]
    async fn commit(&self, salt_hash_hex: String, payload_hash_hex: String) -> RpcResult<bool>;

    /// Reveal the committed preimages (0x-hex bytes).
    #[method(name = "rand.reveal")]
    async fn reveal(&self, salt_hex: String, payload_hex: String) -> RpcResult<bool>;

    /// `round_id` is a decimal round number or `"latest"`.
    #[method(name = "rand.getBeacon")]
    async fn get_beacon(&self, round_id: String) -> RpcResult<Option<RpcBeacon>>;
}

#[rpc(server)]
pub trait AicfApi {
    #[method(name = "aicf.listProviders")]
    async fn list_providers(&self, filter: Option<ProviderFilter>) -> RpcResult<Vec<RpcProvider>>;

    #[method(name = "aicf.getProvider")]
    async fn get_provider(&self, provider_id: String) -> RpcResult<Option<RpcProvider>>;

    #[method(name = "aicf.listJobs")]
    async fn list_jobs(&self, filter: Option<JobFilter>) -> RpcResult<Vec<RpcJob>>;

    #[method(name = "aicf.getJob")]
    async fn get_job(&self, task_id: String) -> RpcResult<Option<RpcJob>>;

    /// Claim a provider's settled payouts for an epoch into its balance.
    /// Returns the claimed amount as a decimal string.
    #[method(name = "aicf.claimPayout")]
    async fn claim_payout(&self, provider_id: String, epoch: u64) -> RpcResult<String>;

    #[method(name = "aicf.getBalance")]
    async fn get_balance(&self, provider_id: String) -> RpcResult<String>;
}

#[rpc(server)]
pub trait SubsApi {
    /// Subscribe to a topic; pushes `{topic, data}` per event and
    /// `{overflow: true, dropped}` after backpressure.
    #[subscription(name = "subscribe" => "subscription", unsubscribe = "unsubscribe", item = serde_json::Value)]
    async fn subscribe(&self, topic: String) -> SubscriptionResult;
}
