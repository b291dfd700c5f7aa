use std::sync::Arc;
use std::time::Instant;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use slotgate_booking::{Booking, BookingService, ServiceCatalog};
use slotgate_common::{AppConfig, SlotgateError, SlotgateResult};
use slotgate_rate_limit::{OperationPolicy, RateLimitInterceptor};

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// Everything a request handler needs: configuration, the rate limiter, the
/// booking service and metrics.
pub struct AppState {
    pub config: AppConfig,
    pub interceptor: RateLimitInterceptor,
    pub bookings: BookingService,
    pub metrics: SlotgateMetrics,
    pub start_time: Instant,
}

/// Prometheus metrics for the booking API.
pub struct SlotgateMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub requests_by_operation: IntCounterVec,
    pub request_duration: HistogramVec,
    pub rate_limited_total: IntCounter,
    pub rate_limited_by_operation: IntCounterVec,
    pub bookings_created: IntCounter,
    pub booking_conflicts: IntCounter,
    pub provider_unavailable: IntCounter,
}

impl SlotgateMetrics {
    /// Create all counters and histograms against a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "slotgate_requests_total",
            "Total number of protected requests received",
        ))?;

        let requests_by_operation = IntCounterVec::new(
            Opts::new(
                "slotgate_operation_requests_total",
                "Protected requests received per operation",
            ),
            &["operation"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "slotgate_request_duration_seconds",
                "Request handling duration in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]),
            &["operation"],
        )?;

        let rate_limited_total = IntCounter::with_opts(Opts::new(
            "slotgate_rate_limited_total",
            "Total number of requests rejected by the rate limiter",
        ))?;

        let rate_limited_by_operation = IntCounterVec::new(
            Opts::new(
                "slotgate_operation_rate_limited_total",
                "Rate-limited requests per operation",
            ),
            &["operation"],
        )?;

        let bookings_created = IntCounter::with_opts(Opts::new(
            "slotgate_bookings_created_total",
            "Appointments successfully booked",
        ))?;

        let booking_conflicts = IntCounter::with_opts(Opts::new(
            "slotgate_booking_conflicts_total",
            "Booking attempts rejected because the provider was already booked",
        ))?;

        let provider_unavailable = IntCounter::with_opts(Opts::new(
            "slotgate_provider_unavailable_total",
            "Booking attempts outside the provider's declared availability",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_by_operation.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;
        registry.register(Box::new(rate_limited_by_operation.clone()))?;
        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(booking_conflicts.clone()))?;
        registry.register(Box::new(provider_unavailable.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            requests_by_operation,
            request_duration,
            rate_limited_total,
            rate_limited_by_operation,
            bookings_created,
            booking_conflicts,
            provider_unavailable,
        })
    }

    /// Count the outcome of a booking attempt.
    pub fn record_booking(&self, result: &SlotgateResult<Booking>) {
        match result {
            Ok(_) => self.bookings_created.inc(),
            Err(SlotgateError::ScheduleConflict(_)) => self.booking_conflicts.inc(),
            Err(SlotgateError::ProviderUnavailable(_)) => self.provider_unavailable.inc(),
            Err(_) => {}
        }
    }
}

impl AppState {
    /// Build state from configuration with in-memory repositories and the
    /// system clock.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let interceptor =
            RateLimitInterceptor::from_config(&config.rate_limit, &config.server.identity_header);
        let bookings = BookingService::in_memory(ServiceCatalog::from_config(&config.catalog));
        Self::with_parts(config, interceptor, bookings)
    }

    /// Build state around an existing interceptor and booking service.
    pub fn with_parts(
        config: AppConfig,
        interceptor: RateLimitInterceptor,
        bookings: BookingService,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            interceptor,
            bookings,
            metrics: SlotgateMetrics::new()?,
            start_time: Instant::now(),
        })
    }

    /// The effective policy for `operation`: the configured override or the
    /// built-in default.
    pub fn policy(&self, operation: &str) -> SlotgateResult<OperationPolicy> {
        OperationPolicy::from_config(operation, &self.config.rate_limit.policy_for(operation))
    }
}
