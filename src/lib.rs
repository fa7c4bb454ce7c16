//! VoxPromo
//!
//! Ad generation service core: accounts and sessions, a free creation quota
//! with a time-limited premium subscription, checkout reconciliation with the
//! payment provider and a per-account history of generated ads.

pub mod config;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use voxpromo_auth::{
    spawn_expiry_sweep, AccountStore, AuthError, Entitlement, EntitlementPolicy, ExpirySweep,
    FileSessionSlot, MemoryAccountStore, MemorySessionSlot, PasswordResetAck, SessionManager,
    SessionSlot, User,
};
use voxpromo_generation::{
    background_music, voice, ContentGenerator, GeminiClient, GenerationError, SpeechSynthesizer,
};
use voxpromo_history::{AdArtifact, AdConfig, ArtifactId, HistoryStore, MemoryHistoryStore};
use voxpromo_payments::{
    Checkout, MercadoPagoClient, PaymentOutcome, PaymentReconciler, ReconcileHandle,
    ReconcileOptions, ReconcileState,
};

use crate::config::{AppConfig, AppOptions};
pub use crate::error::{Error, Result};

/// The main entry point for VoxPromo
pub struct VoxPromo {
    sessions: Arc<SessionManager>,
    payments: Arc<PaymentReconciler>,
    history: Arc<dyn HistoryStore>,
    generator: Arc<dyn ContentGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    options: AppOptions,
}

impl VoxPromo {
    /// Assemble VoxPromo from already built components
    pub fn new(
        sessions: Arc<SessionManager>,
        payments: Arc<PaymentReconciler>,
        history: Arc<dyn HistoryStore>,
        generator: Arc<dyn ContentGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            sessions,
            payments,
            history,
            generator,
            synthesizer,
            options: AppOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AppOptions) -> Self {
        self.options = options;
        self
    }

    /// Wire up VoxPromo with the Gemini and Mercado Pago clients and
    /// in-memory stores, seeding the administrator when configured
    ///
    /// # Example
    ///
    /// ```no_run
    /// use voxpromo::{config::AppConfig, VoxPromo};
    ///
    /// # async fn run() -> voxpromo::Result<()> {
    /// let app = VoxPromo::from_config(AppConfig::from_env()?).await?;
    /// let user = app.login("ana@example.com", "s3cret").await?;
    /// println!("{} creations so far", user.creation_count);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let options = config.options.clone();

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
        let slot: Arc<dyn SessionSlot> = match &config.session_file {
            Some(path) => Arc::new(FileSessionSlot::new(path)),
            None => Arc::new(MemorySessionSlot::new()),
        };
        let policy = EntitlementPolicy::default()
            .with_max_free_creations(options.max_free_creations)
            .with_premium_duration(chrono::Duration::days(options.premium_duration_days));
        let sessions = Arc::new(
            SessionManager::new(store, slot, config.session_secret.as_bytes())?
                .with_policy(policy),
        );

        let checkout = Arc::new(
            MercadoPagoClient::new(&config.mercado_pago_access_token, http_client.clone())
                .with_base_url(&config.mercado_pago_base_url),
        );
        let payments = Arc::new(PaymentReconciler::new_with_options(
            checkout,
            sessions.clone(),
            config.site_url.clone(),
            ReconcileOptions::default()
                .with_poll_interval(options.poll_interval)
                .with_max_polls(options.max_polls)
                .with_checkout_timeout(options.checkout_timeout),
        ));

        let gemini = Arc::new(
            GeminiClient::new(&config.gemini_api_key, http_client)
                .with_base_url(&config.gemini_base_url),
        );

        let app = Self::new(
            sessions,
            payments,
            Arc::new(MemoryHistoryStore::new()),
            gemini.clone(),
            gemini,
        )
        .with_options(options);

        if let Some(admin) = &config.admin {
            app.seed_admin(&admin.email, &admin.password).await?;
        }

        log::info!("VoxPromo ready for {}", config.site_url);
        Ok(app)
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn payments(&self) -> &Arc<PaymentReconciler> {
        &self.payments
    }

    pub fn history_store(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    pub async fn register(&self, email: &str, secret: &str) -> Result<User> {
        Ok(self.sessions.register(email, secret).await?)
    }

    pub async fn login(&self, email: &str, secret: &str) -> Result<User> {
        Ok(self.sessions.login(email, secret).await?)
    }

    pub async fn logout(&self) -> Result<()> {
        Ok(self.sessions.logout().await?)
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.sessions.current_user().await?)
    }

    pub async fn reset_password_request(&self, email: &str) -> Result<PasswordResetAck> {
        Ok(self.sessions.reset_password_request(email).await?)
    }

    /// Entitlement of the current user, `None` when anonymous
    pub async fn entitlement(&self) -> Result<Option<Entitlement>> {
        Ok(self.sessions.entitlement().await?)
    }

    /// Insert the administrator account unless it already exists
    pub async fn seed_admin(&self, email: &str, secret: &str) -> Result<Option<User>> {
        let seeded = voxpromo_auth::seed_admin(
            self.sessions.store().as_ref(),
            self.sessions.verifier().as_ref(),
            self.sessions.clock().as_ref(),
            email,
            secret,
        )
        .await?;
        Ok(seeded)
    }

    /// Generate a new ad for the current user and store it in their history.
    ///
    /// The quota is checked before the generator or the synthesizer is
    /// called. When the artifact is stored but the creation counter cannot be
    /// incremented, [`Error::CreationNotRecorded`] carries the artifact id.
    pub async fn create_ad(&self, config: AdConfig) -> Result<AdArtifact> {
        if config.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidInput("prompt cannot be empty".to_string()).into());
        }
        let voice = voice(&config.voice_id)?;
        if let Some(music) = &config.background_music_id {
            background_music(music)?;
        }

        let (user, entitlement) = self.sessions.authorize_creation().await?;
        log::debug!(
            "Creating ad for {} (premium: {}, remaining: {:?})",
            user.id,
            entitlement.is_premium,
            entitlement.remaining_free
        );

        let content = self
            .generator
            .generate(config.prompt.trim(), config.tone, config.media_type)
            .await?;
        let audio = self
            .synthesizer
            .synthesize(&content.script_text, voice)
            .await?;

        let artifact = AdArtifact::new(
            config,
            content,
            audio.to_data_url()?,
            self.sessions.clock().now(),
        );
        let artifact = self.history.append(&user.id, artifact).await?;

        match self.sessions.record_creation(&user.id).await {
            Ok(updated) => {
                log::info!(
                    "Ad {} created for {} ({} creations)",
                    artifact.id,
                    updated.id,
                    updated.creation_count
                );
                Ok(artifact)
            }
            Err(source) => {
                log::error!(
                    "Ad {} saved for {} but the creation was not counted: {}",
                    artifact.id,
                    user.id,
                    source
                );
                Err(Error::CreationNotRecorded {
                    artifact_id: artifact.id,
                    source,
                })
            }
        }
    }

    /// History of the current user in creation order
    pub async fn history(&self) -> Result<Vec<AdArtifact>> {
        let user = self.require_user().await?;
        Ok(self.history.list(&user.id).await?)
    }

    pub async fn set_favorite(&self, id: &ArtifactId, is_favorite: bool) -> Result<AdArtifact> {
        let mut artifact = self.artifact(id).await?;
        artifact.is_favorite = is_favorite;
        let user = self.require_user().await?;
        Ok(self.history.replace(&user.id, id, artifact).await?)
    }

    pub async fn toggle_favorite(&self, id: &ArtifactId) -> Result<AdArtifact> {
        let artifact = self.artifact(id).await?;
        self.set_favorite(id, !artifact.is_favorite).await
    }

    /// Configuration of a stored artifact, ready to be passed to
    /// [`create_ad`](Self::create_ad) again
    pub async fn duplicate_config(&self, id: &ArtifactId) -> Result<AdConfig> {
        Ok(self.artifact(id).await?.config())
    }

    pub async fn clear_history(&self) -> Result<()> {
        let user = self.require_user().await?;
        Ok(self.history.clear(&user.id).await?)
    }

    /// Start a premium checkout for the current user
    pub async fn initiate_checkout(&self) -> Result<Checkout> {
        Ok(self.payments.initiate_checkout().await?)
    }

    /// Reconcile the payment named by the provider's return URL
    pub async fn reconcile_payment(&self, callback_url: &str) -> PaymentOutcome {
        self.payments.reconcile(callback_url).await
    }

    /// Reconcile in the background; dropping the handle stops polling
    pub fn spawn_reconcile(&self, callback_url: &str) -> ReconcileHandle {
        self.payments.spawn_reconcile(callback_url)
    }

    pub fn on_payment_state_change(&self) -> tokio::sync::broadcast::Receiver<ReconcileState> {
        self.payments.on_state_change()
    }

    /// Start the periodic premium expiry sweep
    pub fn spawn_expiry_sweep(&self) -> ExpirySweep {
        self.spawn_expiry_sweep_every(self.options.expiry_sweep_interval)
    }

    pub fn spawn_expiry_sweep_every(&self, interval: Duration) -> ExpirySweep {
        spawn_expiry_sweep(&self.sessions, interval)
    }

    async fn require_user(&self) -> Result<User> {
        Ok(self
            .sessions
            .current_user()
            .await?
            .ok_or(AuthError::NotAuthenticated)?)
    }

    async fn artifact(&self, id: &ArtifactId) -> Result<AdArtifact> {
        let user = self.require_user().await?;
        self.history
            .get(&user.id, id)
            .await?
            .ok_or_else(|| voxpromo_history::HistoryError::NotFound(*id).into())
    }
}

/// Re-exports of the commonly used types
pub mod prelude {
    pub use crate::config::{AppConfig, AppOptions};
    pub use crate::error::{Error, Result};
    pub use crate::VoxPromo;
    pub use voxpromo_auth::{AuthError, Entitlement, Remaining, User};
    pub use voxpromo_generation::{MediaType, Tone, VOICE_OPTIONS};
    pub use voxpromo_history::{AdArtifact, AdConfig, ArtifactId};
    pub use voxpromo_payments::{Checkout, PaymentOutcome, ReconcileState};
}
