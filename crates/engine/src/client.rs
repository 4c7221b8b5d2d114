use crate::{TaikoExecutionPayload, TaikoExecutionPayloadEnvelope, TaikoPayloadAttributes};
use alloy_primitives::Bytes;
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_engine::{ForkchoiceState, ForkchoiceUpdated, JwtSecret, PayloadId, PayloadStatus};
use alloy_transport::TransportResult;
use alloy_transport_http::{
    hyper_util::{client::legacy::Client, rt::TokioExecutor},
    AuthLayer, Http, HyperClient,
};
use http_body_util::Full;
use tower::ServiceBuilder;
use url::Url;

/// The engine API methods of a Taiko execution engine.
///
/// Note:
/// > The provider should use a JWT authentication layer, see [`auth_provider`].
#[async_trait::async_trait]
pub trait TaikoEngineApi: Sync + Send {
    /// Updates the fork choice of the execution engine, starting a payload build when attributes
    /// are provided.
    async fn forkchoice_updated_v2(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<TaikoPayloadAttributes>,
    ) -> TransportResult<ForkchoiceUpdated>;

    /// Returns the payload built for the provided id.
    async fn get_payload_v2(
        &self,
        payload_id: PayloadId,
    ) -> TransportResult<TaikoExecutionPayloadEnvelope>;

    /// Executes and validates the payload.
    async fn new_payload_v2(&self, payload: TaikoExecutionPayload)
        -> TransportResult<PayloadStatus>;
}

#[async_trait::async_trait]
impl<P: Provider> TaikoEngineApi for P {
    async fn forkchoice_updated_v2(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<TaikoPayloadAttributes>,
    ) -> TransportResult<ForkchoiceUpdated> {
        self.client()
            .request("engine_forkchoiceUpdatedV2", (fork_choice_state, payload_attributes))
            .await
    }

    async fn get_payload_v2(
        &self,
        payload_id: PayloadId,
    ) -> TransportResult<TaikoExecutionPayloadEnvelope> {
        self.client().request("engine_getPayloadV2", (payload_id,)).await
    }

    async fn new_payload_v2(
        &self,
        payload: TaikoExecutionPayload,
    ) -> TransportResult<PayloadStatus> {
        self.client().request("engine_newPayloadV2", (payload,)).await
    }
}

/// Returns a provider for the authenticated RPC of the execution engine, signing every request
/// with a token derived from the JWT secret.
pub fn auth_provider(url: Url, jwt: JwtSecret) -> RootProvider {
    let hyper_client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
    let auth_layer = AuthLayer::new(jwt);
    let service = ServiceBuilder::new().layer(auth_layer).service(hyper_client);
    let layer_transport = HyperClient::with_service(service);

    let http_hyper = Http::with_client(layer_transport, url);
    let rpc_client = RpcClient::new(http_hyper, false);
    RootProvider::new(rpc_client)
}
