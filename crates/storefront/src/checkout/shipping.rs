//! Shipping resolution pipeline.
//!
//! Three dependent lookups keyed by the checkout token: countries, then the
//! subdivisions of the selected country, then the shipping options of the
//! selected `(country, subdivision)`. Each selection narrows the next and
//! invalidates everything downstream of it.
//!
//! The pipeline is split in two:
//!
//! - [`PipelineState`] is a pure transition table. It never performs I/O;
//!   applying an event yields a [`Transition`] that may name the next fetch
//!   to issue, tagged with a [`FetchTag`].
//! - [`ShippingPipeline`] drives the table against a gateway, feeding fetch
//!   results back in as events.
//!
//! Every fetch carries a generation number. Selecting upstream issues fresh
//! generations downstream, so a response to a superseded fetch no longer
//! matches and is discarded. Discards surface as
//! [`Resolution::Superseded`], never as errors.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument, warn};

use shopfront_core::{
    CheckoutToken, CheckoutTokenId, LocaleEntry, LocaleSelection, PipelinePhase, ShippingOption,
    ShippingOptionId,
};

use crate::error::{StorefrontError, ValidationError};
use crate::gateway::{CommerceGateway, GatewayError};

// =============================================================================
// Fetch tagging
// =============================================================================

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Countries,
    Subdivisions,
    Options,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Countries => write!(f, "countries"),
            Self::Subdivisions => write!(f, "subdivisions"),
            Self::Options => write!(f, "options"),
        }
    }
}

/// What a stage fetch looks up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchKey {
    Countries {
        token: CheckoutTokenId,
    },
    Subdivisions {
        token: CheckoutTokenId,
        country: String,
    },
    Options {
        token: CheckoutTokenId,
        country: String,
        subdivision: String,
    },
}

impl FetchKey {
    /// Stage this key belongs to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Countries { .. } => Stage::Countries,
            Self::Subdivisions { .. } => Stage::Subdivisions,
            Self::Options { .. } => Stage::Options,
        }
    }
}

/// Identity of one issued fetch.
///
/// Generations are unique across the lifetime of a [`PipelineState`], so a
/// response is current exactly when its tag equals the stage's outstanding
/// tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTag {
    pub generation: u64,
    pub key: FetchKey,
}

// =============================================================================
// Stage state
// =============================================================================

/// Load status of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus<T> {
    /// Upstream selection missing; nothing requested.
    Pending,
    /// Fetch in flight.
    Loading,
    /// List arrived, in gateway order.
    Ready(Vec<T>),
    /// The last fetch failed; [`PipelineEvent::Retry`] re-issues it.
    Unavailable(String),
}

impl<T> Default for StageStatus<T> {
    fn default() -> Self {
        Self::Pending
    }
}

impl<T> StageStatus<T> {
    /// Loaded entries; empty unless ready.
    #[must_use]
    pub fn entries(&self) -> &[T] {
        match self {
            Self::Ready(entries) => entries,
            _ => &[],
        }
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Failure message of the last fetch, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Unavailable(message) => Some(message),
            _ => None,
        }
    }
}

/// Status plus the tag of the most recent fetch for the current key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot<T> {
    status: StageStatus<T>,
    fetch: Option<FetchTag>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            fetch: None,
        }
    }
}

impl<T> Slot<T> {
    fn awaits(&self, tag: &FetchTag) -> bool {
        self.status.is_loading() && self.fetch.as_ref() == Some(tag)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// Transition table
// =============================================================================

/// Input to the transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A new checkout token; restarts the pipeline.
    TokenIssued(CheckoutTokenId),
    CountriesLoaded {
        tag: FetchTag,
        result: Result<Vec<LocaleEntry>, String>,
    },
    CountrySelected(String),
    SubdivisionsLoaded {
        tag: FetchTag,
        result: Result<Vec<LocaleEntry>, String>,
    },
    SubdivisionSelected(String),
    OptionsLoaded {
        tag: FetchTag,
        result: Result<Vec<ShippingOption>, String>,
    },
    OptionSelected(ShippingOptionId),
    /// Re-issue the fetch of the most upstream unavailable stage.
    Retry,
}

/// Outcome of applying an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// State changed; issue `fetch` next if present.
    Applied { fetch: Option<FetchTag> },
    /// The event answered a superseded fetch; state unchanged.
    Stale,
    /// The selection was already current; state unchanged.
    Unchanged,
}

/// Pure state of the shipping pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineState {
    token: Option<CheckoutTokenId>,
    generation: u64,
    countries: Slot<LocaleEntry>,
    subdivisions: Slot<LocaleEntry>,
    options: Slot<ShippingOption>,
    country: Option<String>,
    subdivision: Option<String>,
    shipping_option: Option<ShippingOptionId>,
}

impl PipelineState {
    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a selection made before its stage
    /// is ready, a selection absent from the current list, or a retry with
    /// no failed stage. State is unchanged on error.
    pub fn apply(&mut self, event: PipelineEvent) -> Result<Transition, ValidationError> {
        match event {
            PipelineEvent::TokenIssued(token) => {
                let generation = self.generation;
                *self = Self {
                    token: Some(token.clone()),
                    generation,
                    ..Self::default()
                };
                let tag = self.issue(FetchKey::Countries { token });
                self.countries.status = StageStatus::Loading;
                self.countries.fetch = Some(tag.clone());
                Ok(Transition::Applied { fetch: Some(tag) })
            }

            PipelineEvent::CountriesLoaded { tag, result } => {
                if !self.countries.awaits(&tag) {
                    return Ok(Transition::Stale);
                }
                match result {
                    Ok(countries) => {
                        let first = countries.first().map(|c| c.code.clone());
                        self.countries.status = StageStatus::Ready(countries);
                        let fetch = first.and_then(|code| self.choose_country(code));
                        Ok(Transition::Applied { fetch })
                    }
                    Err(message) => {
                        self.countries.status = StageStatus::Unavailable(message);
                        Ok(Transition::Applied { fetch: None })
                    }
                }
            }

            PipelineEvent::CountrySelected(code) => {
                if !self.countries.status.is_ready() {
                    return Err(ValidationError::StageNotReady(self.phase()));
                }
                if !self.countries.status.entries().iter().any(|c| c.code == code) {
                    return Err(ValidationError::UnknownCountry(code));
                }
                if self.country.as_deref() == Some(code.as_str()) {
                    return Ok(Transition::Unchanged);
                }
                let fetch = self.choose_country(code);
                Ok(Transition::Applied { fetch })
            }

            PipelineEvent::SubdivisionsLoaded { tag, result } => {
                if !self.subdivisions.awaits(&tag) {
                    return Ok(Transition::Stale);
                }
                match result {
                    Ok(subdivisions) => {
                        let first = subdivisions.first().map(|s| s.code.clone());
                        self.subdivisions.status = StageStatus::Ready(subdivisions);
                        let fetch = first.and_then(|code| self.choose_subdivision(code));
                        Ok(Transition::Applied { fetch })
                    }
                    Err(message) => {
                        self.subdivisions.status = StageStatus::Unavailable(message);
                        Ok(Transition::Applied { fetch: None })
                    }
                }
            }

            PipelineEvent::SubdivisionSelected(code) => {
                if !self.subdivisions.status.is_ready() {
                    return Err(ValidationError::StageNotReady(self.phase()));
                }
                if !self
                    .subdivisions
                    .status
                    .entries()
                    .iter()
                    .any(|s| s.code == code)
                {
                    return Err(ValidationError::UnknownSubdivision(code));
                }
                if self.subdivision.as_deref() == Some(code.as_str()) {
                    return Ok(Transition::Unchanged);
                }
                let fetch = self.choose_subdivision(code);
                Ok(Transition::Applied { fetch })
            }

            PipelineEvent::OptionsLoaded { tag, result } => {
                if !self.options.awaits(&tag) {
                    return Ok(Transition::Stale);
                }
                match result {
                    Ok(options) => {
                        self.shipping_option = options.first().map(|o| o.id.clone());
                        self.options.status = StageStatus::Ready(options);
                    }
                    Err(message) => {
                        self.options.status = StageStatus::Unavailable(message);
                    }
                }
                Ok(Transition::Applied { fetch: None })
            }

            PipelineEvent::OptionSelected(id) => {
                if !self.options.status.is_ready() {
                    return Err(ValidationError::StageNotReady(self.phase()));
                }
                if !self.options.status.entries().iter().any(|o| o.id == id) {
                    return Err(ValidationError::UnknownShippingOption(id.into_inner()));
                }
                if self.shipping_option.as_ref() == Some(&id) {
                    return Ok(Transition::Unchanged);
                }
                self.shipping_option = Some(id);
                Ok(Transition::Applied { fetch: None })
            }

            PipelineEvent::Retry => {
                let failed = [
                    (self.countries.status.error().is_some(), self.countries.fetch.clone()),
                    (
                        self.subdivisions.status.error().is_some(),
                        self.subdivisions.fetch.clone(),
                    ),
                    (self.options.status.error().is_some(), self.options.fetch.clone()),
                ]
                .into_iter()
                .find_map(|(failed, fetch)| if failed { fetch } else { None })
                .ok_or(ValidationError::NothingToRetry)?;

                let tag = self.issue(failed.key);
                match tag.key.stage() {
                    Stage::Countries => {
                        self.countries.status = StageStatus::Loading;
                        self.countries.fetch = Some(tag.clone());
                    }
                    Stage::Subdivisions => {
                        self.subdivisions.status = StageStatus::Loading;
                        self.subdivisions.fetch = Some(tag.clone());
                    }
                    Stage::Options => {
                        self.options.status = StageStatus::Loading;
                        self.options.fetch = Some(tag.clone());
                    }
                }
                Ok(Transition::Applied { fetch: Some(tag) })
            }
        }
    }

    fn issue(&mut self, key: FetchKey) -> FetchTag {
        self.generation += 1;
        FetchTag {
            generation: self.generation,
            key,
        }
    }

    /// Select a country, clear everything downstream, and tag the
    /// subdivision fetch.
    ///
    /// Returns `None` only without a token, which a ready country list
    /// rules out.
    fn choose_country(&mut self, code: String) -> Option<FetchTag> {
        let token = self.token.clone()?;
        self.subdivision = None;
        self.shipping_option = None;
        self.options.reset();

        let tag = self.issue(FetchKey::Subdivisions {
            token,
            country: code.clone(),
        });
        self.country = Some(code);
        self.subdivisions.status = StageStatus::Loading;
        self.subdivisions.fetch = Some(tag.clone());
        Some(tag)
    }

    /// Select a subdivision, clear the option, and tag the option fetch.
    ///
    /// Returns `None` only when no country is selected, which a ready
    /// subdivision list rules out.
    fn choose_subdivision(&mut self, code: String) -> Option<FetchTag> {
        let country = self.country.clone()?;
        let token = self.token.clone()?;
        self.shipping_option = None;

        let tag = self.issue(FetchKey::Options {
            token,
            country,
            subdivision: code.clone(),
        });
        self.subdivision = Some(code);
        self.options.status = StageStatus::Loading;
        self.options.fetch = Some(tag.clone());
        Some(tag)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Furthest resolved phase.
    ///
    /// A failed stage reports the phase before it; inspect the stage status
    /// for the failure.
    #[must_use]
    pub fn phase(&self) -> PipelinePhase {
        if self.token.is_none() {
            return PipelinePhase::Idle;
        }
        match &self.countries.status {
            StageStatus::Loading => return PipelinePhase::CountriesLoading,
            StageStatus::Ready(_) => {}
            StageStatus::Pending | StageStatus::Unavailable(_) => return PipelinePhase::Idle,
        }
        match &self.subdivisions.status {
            StageStatus::Loading => return PipelinePhase::SubdivisionsLoading,
            StageStatus::Ready(_) => {}
            StageStatus::Pending | StageStatus::Unavailable(_) => {
                return PipelinePhase::CountriesReady;
            }
        }
        match &self.options.status {
            StageStatus::Loading => PipelinePhase::OptionsLoading,
            StageStatus::Ready(_) => PipelinePhase::OptionsReady,
            StageStatus::Pending | StageStatus::Unavailable(_) => PipelinePhase::SubdivisionsReady,
        }
    }

    /// The complete selection; only available once options are ready and
    /// one is selected.
    #[must_use]
    pub fn selection(&self) -> Option<LocaleSelection> {
        if self.phase() != PipelinePhase::OptionsReady {
            return None;
        }
        Some(LocaleSelection {
            country: self.country.clone()?,
            subdivision: self.subdivision.clone()?,
            shipping_option: self.shipping_option.clone()?,
        })
    }

    #[must_use]
    pub const fn token(&self) -> Option<&CheckoutTokenId> {
        self.token.as_ref()
    }

    #[must_use]
    pub const fn countries(&self) -> &StageStatus<LocaleEntry> {
        &self.countries.status
    }

    #[must_use]
    pub const fn subdivisions(&self) -> &StageStatus<LocaleEntry> {
        &self.subdivisions.status
    }

    #[must_use]
    pub const fn options(&self) -> &StageStatus<ShippingOption> {
        &self.options.status
    }

    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    #[must_use]
    pub fn subdivision(&self) -> Option<&str> {
        self.subdivision.as_deref()
    }

    #[must_use]
    pub const fn shipping_option(&self) -> Option<&ShippingOptionId> {
        self.shipping_option.as_ref()
    }

    /// The selected shipping option with its price.
    #[must_use]
    pub fn selected_option(&self) -> Option<&ShippingOption> {
        let id = self.shipping_option.as_ref()?;
        self.options.status.entries().iter().find(|o| &o.id == id)
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Result of a pipeline operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The operation's results were applied.
    Applied,
    /// A newer selection superseded this operation; its results were
    /// discarded.
    Superseded,
    /// The selection was already current.
    Unchanged,
}

/// Drives [`PipelineState`] against a gateway.
///
/// Operations may run concurrently; the state lock is never held across a
/// gateway call.
pub struct ShippingPipeline<G> {
    gateway: Arc<G>,
    state: Mutex<PipelineState>,
}

impl<G: CommerceGateway> ShippingPipeline<G> {
    #[must_use]
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            state: Mutex::new(PipelineState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PipelineState {
        self.lock().clone()
    }

    #[must_use]
    pub fn phase(&self) -> PipelinePhase {
        self.lock().phase()
    }

    #[must_use]
    pub fn selection(&self) -> Option<LocaleSelection> {
        self.lock().selection()
    }

    /// Restart the pipeline for `token` and resolve default selections as
    /// far as the gateway allows.
    ///
    /// # Errors
    ///
    /// Returns the classified gateway error of the first stage that failed;
    /// earlier stages keep their results.
    #[instrument(skip(self, token), fields(token_id = %token.id))]
    pub async fn start(&self, token: &CheckoutToken) -> Result<Resolution, StorefrontError> {
        self.drive(PipelineEvent::TokenIssued(token.id.clone()))
            .await
    }

    /// Select a country from the loaded list.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown country or an unloaded
    /// list, or the classified gateway error of a downstream fetch.
    #[instrument(skip(self))]
    pub async fn select_country(&self, country: &str) -> Result<Resolution, StorefrontError> {
        self.drive(PipelineEvent::CountrySelected(country.to_string()))
            .await
    }

    /// Select a subdivision of the selected country.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown subdivision or an unloaded
    /// list, or the classified gateway error of the option fetch.
    #[instrument(skip(self))]
    pub async fn select_subdivision(
        &self,
        subdivision: &str,
    ) -> Result<Resolution, StorefrontError> {
        self.drive(PipelineEvent::SubdivisionSelected(subdivision.to_string()))
            .await
    }

    /// Select a shipping option. Never touches the gateway.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown option or an unloaded list.
    #[instrument(skip(self), fields(shipping_option = %option))]
    pub fn select_shipping_option(
        &self,
        option: &ShippingOptionId,
    ) -> Result<Resolution, StorefrontError> {
        match self.apply(PipelineEvent::OptionSelected(option.clone()))? {
            Transition::Unchanged => Ok(Resolution::Unchanged),
            _ => Ok(Resolution::Applied),
        }
    }

    /// Re-issue the fetch of the most upstream failed stage.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NothingToRetry`] when no stage failed, or
    /// the classified gateway error if the fetch fails again.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> Result<Resolution, StorefrontError> {
        self.drive(PipelineEvent::Retry).await
    }

    fn apply(&self, event: PipelineEvent) -> Result<Transition, ValidationError> {
        self.lock().apply(event)
    }

    async fn drive(&self, event: PipelineEvent) -> Result<Resolution, StorefrontError> {
        let mut next = match self.apply(event)? {
            Transition::Applied { fetch } => fetch,
            Transition::Stale => return Ok(Resolution::Superseded),
            Transition::Unchanged => return Ok(Resolution::Unchanged),
        };

        while let Some(tag) = next {
            let generation = tag.generation;
            let stage = tag.key.stage();
            let (event, failure) = self.fetch(tag).await;

            match self.apply(event)? {
                Transition::Applied { fetch } => {
                    if let Some(err) = failure {
                        warn!(%stage, error = %err, "Shipping stage unavailable");
                        return Err(err.into());
                    }
                    next = fetch;
                }
                Transition::Stale => {
                    debug!(%stage, generation, "Discarding superseded shipping response");
                    return Ok(Resolution::Superseded);
                }
                Transition::Unchanged => return Ok(Resolution::Unchanged),
            }
        }

        Ok(Resolution::Applied)
    }

    async fn fetch(&self, tag: FetchTag) -> (PipelineEvent, Option<GatewayError>) {
        debug!(stage = %tag.key.stage(), generation = tag.generation, "Fetching shipping stage");
        match tag.key.clone() {
            FetchKey::Countries { token } => {
                let (result, failure) =
                    split(self.gateway.list_shipping_countries(&token).await);
                (PipelineEvent::CountriesLoaded { tag, result }, failure)
            }
            FetchKey::Subdivisions { token, country } => {
                let (result, failure) = split(
                    self.gateway
                        .list_shipping_subdivisions(&token, &country)
                        .await,
                );
                (PipelineEvent::SubdivisionsLoaded { tag, result }, failure)
            }
            FetchKey::Options {
                token,
                country,
                subdivision,
            } => {
                let (result, failure) = split(
                    self.gateway
                        .shipping_options(&token, &country, &subdivision)
                        .await,
                );
                (PipelineEvent::OptionsLoaded { tag, result }, failure)
            }
        }
    }
}

/// Keep the message for the state table and the error for the caller.
fn split<T>(
    result: Result<Vec<T>, GatewayError>,
) -> (Result<Vec<T>, String>, Option<GatewayError>) {
    match result {
        Ok(entries) => (Ok(entries), None),
        Err(err) => (Err(err.to_string()), Some(err)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::gateway::mock::usd;

    fn token() -> CheckoutTokenId {
        CheckoutTokenId::new("chkt_1")
    }

    fn locales(entries: &[(&str, &str)]) -> Vec<LocaleEntry> {
        entries
            .iter()
            .map(|(code, name)| LocaleEntry::new(*code, *name))
            .collect()
    }

    fn option(id: &str) -> ShippingOption {
        ShippingOption {
            id: ShippingOptionId::new(id),
            description: id.to_string(),
            price: usd(Decimal::new(500, 2)),
            countries: Vec::new(),
        }
    }

    fn fetched(transition: Transition) -> FetchTag {
        match transition {
            Transition::Applied { fetch: Some(tag) } => tag,
            other => panic!("expected a fetch, got {other:?}"),
        }
    }

    /// State with countries CA/US loaded and the CA subdivision fetch issued.
    fn countries_loaded() -> (PipelineState, FetchTag) {
        let mut state = PipelineState::default();
        let tag = fetched(state.apply(PipelineEvent::TokenIssued(token())).unwrap());
        let tag = fetched(
            state
                .apply(PipelineEvent::CountriesLoaded {
                    tag,
                    result: Ok(locales(&[("CA", "Canada"), ("US", "United States")])),
                })
                .unwrap(),
        );
        (state, tag)
    }

    #[test]
    fn test_token_issues_country_fetch() {
        let mut state = PipelineState::default();
        assert_eq!(state.phase(), PipelinePhase::Idle);

        let tag = fetched(state.apply(PipelineEvent::TokenIssued(token())).unwrap());

        assert_eq!(tag.key, FetchKey::Countries { token: token() });
        assert_eq!(state.phase(), PipelinePhase::CountriesLoading);
    }

    #[test]
    fn test_first_country_selected_by_default() {
        let (state, tag) = countries_loaded();

        assert_eq!(state.country(), Some("CA"));
        assert_eq!(
            tag.key,
            FetchKey::Subdivisions {
                token: token(),
                country: "CA".to_string(),
            }
        );
        assert_eq!(state.phase(), PipelinePhase::SubdivisionsLoading);
    }

    #[test]
    fn test_stale_subdivisions_discarded_after_country_change() {
        let (mut state, ca_tag) = countries_loaded();
        let us_tag = fetched(
            state
                .apply(PipelineEvent::CountrySelected("US".to_string()))
                .unwrap(),
        );
        assert!(us_tag.generation > ca_tag.generation);

        let transition = state
            .apply(PipelineEvent::SubdivisionsLoaded {
                tag: ca_tag,
                result: Ok(locales(&[("ON", "Ontario")])),
            })
            .unwrap();

        assert_eq!(transition, Transition::Stale);
        assert!(state.subdivisions().is_loading());
        assert_eq!(state.country(), Some("US"));

        state
            .apply(PipelineEvent::SubdivisionsLoaded {
                tag: us_tag,
                result: Ok(locales(&[("NY", "New York")])),
            })
            .unwrap();
        assert_eq!(state.subdivision(), Some("NY"));
    }

    #[test]
    fn test_stale_failure_is_discarded_too() {
        let (mut state, ca_tag) = countries_loaded();
        state
            .apply(PipelineEvent::CountrySelected("US".to_string()))
            .unwrap();

        let transition = state
            .apply(PipelineEvent::SubdivisionsLoaded {
                tag: ca_tag,
                result: Err("boom".to_string()),
            })
            .unwrap();

        assert_eq!(transition, Transition::Stale);
        assert!(state.subdivisions().error().is_none());
    }

    #[test]
    fn test_subdivision_change_clears_option_before_fetch() {
        let (mut state, tag) = countries_loaded();
        let options_tag = fetched(
            state
                .apply(PipelineEvent::SubdivisionsLoaded {
                    tag,
                    result: Ok(locales(&[("ON", "Ontario"), ("QC", "Quebec")])),
                })
                .unwrap(),
        );
        state
            .apply(PipelineEvent::OptionsLoaded {
                tag: options_tag,
                result: Ok(vec![option("ship_on")]),
            })
            .unwrap();
        assert!(state.selection().is_some());

        let qc_tag = fetched(
            state
                .apply(PipelineEvent::SubdivisionSelected("QC".to_string()))
                .unwrap(),
        );

        assert_eq!(state.shipping_option(), None);
        assert!(state.selection().is_none());
        assert_eq!(state.phase(), PipelinePhase::OptionsLoading);
        assert!(matches!(qc_tag.key, FetchKey::Options { ref subdivision, .. } if subdivision == "QC"));
    }

    #[test]
    fn test_selection_complete_only_when_options_ready() {
        let (mut state, tag) = countries_loaded();
        let options_tag = fetched(
            state
                .apply(PipelineEvent::SubdivisionsLoaded {
                    tag,
                    result: Ok(locales(&[("ON", "Ontario")])),
                })
                .unwrap(),
        );
        assert!(state.selection().is_none());

        state
            .apply(PipelineEvent::OptionsLoaded {
                tag: options_tag,
                result: Ok(vec![option("ship_a"), option("ship_b")]),
            })
            .unwrap();

        assert_eq!(
            state.selection(),
            Some(LocaleSelection {
                country: "CA".to_string(),
                subdivision: "ON".to_string(),
                shipping_option: ShippingOptionId::new("ship_a"),
            })
        );
    }

    #[test]
    fn test_unknown_selection_rejected() {
        let (mut state, _) = countries_loaded();
        let before = state.clone();

        let err = state
            .apply(PipelineEvent::CountrySelected("ZZ".to_string()))
            .unwrap_err();

        assert_eq!(err, ValidationError::UnknownCountry("ZZ".to_string()));
        assert_eq!(state, before);
    }

    #[test]
    fn test_selection_before_ready_rejected() {
        let mut state = PipelineState::default();
        state.apply(PipelineEvent::TokenIssued(token())).unwrap();

        let err = state
            .apply(PipelineEvent::CountrySelected("CA".to_string()))
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::StageNotReady(PipelinePhase::CountriesLoading)
        );
    }

    #[test]
    fn test_reselecting_current_value_is_noop() {
        let (mut state, _) = countries_loaded();
        let transition = state
            .apply(PipelineEvent::CountrySelected("CA".to_string()))
            .unwrap();
        assert_eq!(transition, Transition::Unchanged);
    }

    #[test]
    fn test_failure_marks_stage_and_retry_reissues() {
        let (mut state, tag) = countries_loaded();
        state
            .apply(PipelineEvent::SubdivisionsLoaded {
                tag: tag.clone(),
                result: Err("Gateway unavailable".to_string()),
            })
            .unwrap();

        assert_eq!(state.country(), Some("CA"));
        assert_eq!(state.subdivisions().error(), Some("Gateway unavailable"));
        assert_eq!(state.phase(), PipelinePhase::CountriesReady);

        let retry = fetched(state.apply(PipelineEvent::Retry).unwrap());
        assert_eq!(retry.key, tag.key);
        assert!(retry.generation > tag.generation);
        assert!(state.subdivisions().is_loading());
    }

    #[test]
    fn test_retry_without_failure_rejected() {
        let (mut state, _) = countries_loaded();
        assert_eq!(
            state.apply(PipelineEvent::Retry).unwrap_err(),
            ValidationError::NothingToRetry
        );
    }

    #[test]
    fn test_empty_list_leaves_stage_ready_without_selection() {
        let mut state = PipelineState::default();
        let tag = fetched(state.apply(PipelineEvent::TokenIssued(token())).unwrap());

        let transition = state
            .apply(PipelineEvent::CountriesLoaded {
                tag,
                result: Ok(Vec::new()),
            })
            .unwrap();

        assert_eq!(transition, Transition::Applied { fetch: None });
        assert_eq!(state.country(), None);
        assert_eq!(state.phase(), PipelinePhase::CountriesReady);
    }

    #[test]
    fn test_new_token_invalidates_outstanding_fetches() {
        let (mut state, old_tag) = countries_loaded();
        state
            .apply(PipelineEvent::TokenIssued(CheckoutTokenId::new("chkt_2")))
            .unwrap();

        let transition = state
            .apply(PipelineEvent::SubdivisionsLoaded {
                tag: old_tag,
                result: Ok(locales(&[("ON", "Ontario")])),
            })
            .unwrap();

        assert_eq!(transition, Transition::Stale);
        assert_eq!(state.country(), None);
    }
}
