use crate::domain::{Options, PaginatedResponse, Risk, RiskDraft, State};
use crate::error::{Result, RiskError};
use crate::storage::RiskStore;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain logic for risks: validation, id assignment and defaults, in front of a store
pub struct RiskService {
    store: Arc<dyn RiskStore>,
}

impl RiskService {
    pub fn new(store: Arc<dyn RiskStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a new risk under a freshly minted id.
    ///
    /// Any id supplied by the caller is discarded. An invalid state fails
    /// before the store is touched.
    pub async fn add(&self, draft: RiskDraft) -> Result<Risk> {
        if !State::is_valid(&draft.state) {
            warn!("Rejected risk with invalid state '{}'", draft.state);
            return Err(RiskError::Validation(format!(
                "unknown risk state '{}', expected one of open, closed, accepted, investigating",
                draft.state
            )));
        }

        let risk = draft.into_risk(Uuid::new_v4())?;
        self.store.add(&risk).await?;

        info!("Created risk {} ({})", risk.id, risk.state);
        Ok(risk)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Risk>> {
        self.store.get_by_id(id).await
    }

    pub async fn get_all(&self, options: Options) -> Result<PaginatedResponse> {
        let options = options.clamped();
        debug!("Listing risks with {:?}", options);
        self.store.get_all(&options).await
    }

    pub async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.store.delete_by_id(id).await?;
        info!("Deleted risk {}", id);
        Ok(())
    }
}
