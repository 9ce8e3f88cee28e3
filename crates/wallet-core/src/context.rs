use std::sync::Arc;

use tracing::info;

use crate::config::WalletConfig;
use crate::deriver::AccountDeriver;
use crate::error::OperationError;
use crate::fee::FeeCalculator;
use crate::network::{create_adapter, NetworkAdapter};
use crate::protocol::{codec_for, TransactionCodec};
use crate::qr::QrCodec;
use crate::store::{ScopedStorage, Storage, WalletStore};

/// Everything one wallet instance needs, built from its configuration.
pub struct WalletContext {
    pub config: WalletConfig,
    pub deriver: AccountDeriver,
    pub codec: Arc<dyn TransactionCodec>,
    pub adapter: Arc<dyn NetworkAdapter>,
    pub fees: FeeCalculator,
    pub qr: QrCodec,
    pub store: Arc<WalletStore>,
}

impl WalletContext {
    /// `storage` and `secure` are shared backends; keys are scoped per
    /// protocol and network.
    pub fn from_config(
        config: WalletConfig,
        storage: Arc<dyn Storage>,
        secure: Arc<dyn Storage>,
    ) -> Result<Self, OperationError> {
        let adapter = create_adapter(&config)?;
        Self::with_adapter(config, adapter, storage, secure)
    }

    pub fn with_adapter(
        config: WalletConfig,
        adapter: Arc<dyn NetworkAdapter>,
        storage: Arc<dyn Storage>,
        secure: Arc<dyn Storage>,
    ) -> Result<Self, OperationError> {
        config.validate()?;
        let scope = format!("{}.{}", config.protocol, config.network_identifier);
        let codec = codec_for(config.protocol);
        let store = WalletStore::new(
            config.clone(),
            adapter.clone(),
            codec.clone(),
            Arc::new(ScopedStorage::new(storage, scope.clone())),
            Arc::new(ScopedStorage::new(secure, scope)),
        )?;
        info!(
            protocol = %config.protocol,
            network = %config.network_identifier,
            node = %config.node_url,
            "wallet context ready"
        );
        Ok(Self {
            deriver: AccountDeriver::new(config.protocol),
            fees: FeeCalculator::new(config.protocol),
            qr: QrCodec::default(),
            codec,
            adapter,
            store,
            config,
        })
    }
}
