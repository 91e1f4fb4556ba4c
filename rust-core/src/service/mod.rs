//! Process wiring: rotator thread, verifier and HTTP front end.

pub mod config;
pub mod http;

use crate::audit::{AuditLog, JsonlAuditLog, MemoryAuditLog};
use crate::error::ServiceError;
use crate::rotator::{RotatorHandle, WindowRotator};
use crate::seed::SeedSource;
use crate::verifier::TicketVerifier;
use crate::window::{Clock, WindowState};
use config::ServiceConfig;
use http::{start_http_server, HttpServer};
use std::net::SocketAddr;
use std::sync::Arc;

/// A running attendance service. Dropping it stops rotation; the HTTP accept
/// thread lives until process exit.
pub struct AttendanceService {
    state: WindowState,
    verifier: TicketVerifier,
    rotator: RotatorHandle,
    http: HttpServer,
}

impl AttendanceService {
    /// Publish the first window, start periodic rotation and bind HTTP.
    pub fn start(
        cfg: &ServiceConfig,
        seed: Arc<dyn SeedSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        cfg.validate()?;
        let audit: Arc<dyn AuditLog> = match &cfg.audit_log_path {
            Some(path) => Arc::new(JsonlAuditLog::open(path)?),
            None => Arc::new(MemoryAuditLog::new()),
        };
        Self::start_with_audit(cfg, seed, clock, audit)
    }

    pub fn start_with_audit(
        cfg: &ServiceConfig,
        seed: Arc<dyn SeedSource>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self, ServiceError> {
        let state = WindowState::new();
        let verifier = TicketVerifier::new(state.clone(), audit);
        let rotator =
            WindowRotator::new(state.clone(), seed, clock).spawn(cfg.rotation_period())?;
        let http = start_http_server(&cfg.listen_addr, state.clone(), verifier.clone())?;
        Ok(Self {
            state,
            verifier,
            rotator,
            http,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.http.local_addr()
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn verifier(&self) -> &TicketVerifier {
        &self.verifier
    }

    /// Stop rotation and wait for the rotator thread.
    pub fn shutdown(self) {
        self.rotator.stop();
    }
}
