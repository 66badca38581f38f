use futures::future::{BoxFuture, FutureExt, Shared, ready};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    NotStarted,
    Loading,
    Loaded,
    Failed,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not_started",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        })
    }
}

/// A TeX macro: replacement body and number of arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexMacro {
    pub body: String,
    #[serde(default)]
    pub args: u8,
}

/// Unit hints and layout options handed to the engine with each formula.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionOptions {
    /// Pixels per `em`.
    pub em: f32,
    /// Pixels per `ex`.
    pub ex: f32,
    pub display: bool,
    pub macros: BTreeMap<String, TexMacro>,
}

/// The loaded engine. Each method returns the engine's container markup; the
/// usable `<svg>` is its first child element.
pub trait TypesettingEngine: Send + Sync {
    fn tex_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError>;
    fn mathml_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError>;
    fn ascii_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError>;
}

/// One-shot fetch/initialisation of an engine.
pub trait EngineLoader: Send + Sync {
    fn fetch(&self) -> BoxFuture<'static, Result<Arc<dyn TypesettingEngine>, EngineError>>;
}

type LoadOutcome = Result<Arc<dyn TypesettingEngine>, Arc<EngineError>>;

enum ProviderState {
    NotStarted,
    Loading(Shared<BoxFuture<'static, LoadOutcome>>),
    Loaded(Arc<dyn TypesettingEngine>),
    Failed(Arc<EngineError>),
}

struct ProviderInner {
    loader: Arc<dyn EngineLoader>,
    state: Mutex<ProviderState>,
}

/// Cloneable handle to one engine's load state.
#[derive(Clone)]
pub struct TypesettingProvider {
    inner: Arc<ProviderInner>,
}

static GLOBAL_PROVIDER: OnceCell<TypesettingProvider> = OnceCell::new();

impl TypesettingProvider {
    pub fn new(loader: impl EngineLoader + 'static) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                loader: Arc::new(loader),
                state: Mutex::new(ProviderState::NotStarted),
            }),
        }
    }

    /// Publishes `provider` as the process-wide instance. Returns it back if
    /// one is already installed.
    pub fn install_global(provider: TypesettingProvider) -> Result<(), TypesettingProvider> {
        GLOBAL_PROVIDER.set(provider)
    }

    pub fn global() -> Option<&'static TypesettingProvider> {
        GLOBAL_PROVIDER.get()
    }

    pub fn status(&self) -> ProviderStatus {
        match &*self.state() {
            ProviderState::NotStarted => ProviderStatus::NotStarted,
            ProviderState::Loading(_) => ProviderStatus::Loading,
            ProviderState::Loaded(_) => ProviderStatus::Loaded,
            ProviderState::Failed(_) => ProviderStatus::Failed,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status() == ProviderStatus::Loaded
    }

    /// The engine, if loading has completed successfully.
    pub fn engine(&self) -> Option<Arc<dyn TypesettingEngine>> {
        match &*self.state() {
            ProviderState::Loaded(engine) => Some(engine.clone()),
            _ => None,
        }
    }

    /// The fetch error, if loading failed.
    pub fn failure(&self) -> Option<Arc<EngineError>> {
        match &*self.state() {
            ProviderState::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Moves `not_started` to `loading` and resolves with the terminal status.
    /// Later calls join the pending fetch or return immediately once it is
    /// settled.
    ///
    /// No executor is involved: the loader's `fetch` runs on first poll and
    /// the state only leaves `loading` once one of these futures is polled to
    /// completion. Dropping every returned future early leaves the provider
    /// `loading` until `load()` is awaited again.
    pub fn load(&self) -> BoxFuture<'static, ProviderStatus> {
        let pending = {
            let mut state = self.state();
            match &*state {
                ProviderState::NotStarted => {
                    log::debug!("typesetting provider: not_started -> loading");
                    let loader = self.inner.loader.clone();
                    let fetch = async move { loader.fetch().await.map_err(Arc::new) }
                        .boxed()
                        .shared();
                    *state = ProviderState::Loading(fetch.clone());
                    fetch
                }
                ProviderState::Loading(fetch) => fetch.clone(),
                ProviderState::Loaded(_) => return ready(ProviderStatus::Loaded).boxed(),
                ProviderState::Failed(_) => return ready(ProviderStatus::Failed).boxed(),
            }
        };

        let provider = self.clone();
        async move {
            let outcome = pending.await;
            provider.settle(outcome)
        }
        .boxed()
    }

    /// Blocks the current thread until `load()` resolves.
    pub fn load_blocking(&self) -> ProviderStatus {
        pollster::block_on(self.load())
    }

    fn settle(&self, outcome: LoadOutcome) -> ProviderStatus {
        let mut state = self.state();
        if let ProviderState::Loading(_) = &*state {
            *state = match outcome {
                Ok(engine) => {
                    log::debug!("typesetting provider: loading -> loaded");
                    ProviderState::Loaded(engine)
                }
                Err(err) => {
                    log::error!("typesetting provider failed to load: {err}");
                    ProviderState::Failed(err)
                }
            };
        }
        match &*state {
            ProviderState::Loaded(_) => ProviderStatus::Loaded,
            ProviderState::Failed(_) => ProviderStatus::Failed,
            ProviderState::Loading(_) => ProviderStatus::Loading,
            ProviderState::NotStarted => ProviderStatus::NotStarted,
        }
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TypesettingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypesettingProvider")
            .field("status", &self.status())
            .finish()
    }
}
