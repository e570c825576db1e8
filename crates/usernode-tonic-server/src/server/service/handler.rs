//! gRPC service implementation for the user directory.
//!
//! This module defines [`IdentityService`], the concrete implementation of the
//! [`Identity`] gRPC service from `usernode.proto`. Every RPC
//! converts its task message into a directory call and turns the outcome into
//! a result message carrying `errno`/`errmsg`. Failures never surface as gRPC
//! statuses.
//!
//! ## Responsibilities
//!
//! - Refuse new requests once shutdown has begun.
//! - Track in-flight requests so shutdown can drain them.
//! - Emit per-RPC telemetry (request count, errors, duration).

use crate::server::telemetry::{
    decrement_requests_inflight, increment_request_errors, increment_requests,
    increment_requests_inflight, record_request_duration,
};
use core::{future::Future, time::Duration};
use portable_atomic::{AtomicUsize, Ordering};
use std::{sync::Arc, time::Instant};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use usernode::{Directory, parse_info};
use usernode_tonic_core::{
    Errno, Error, Reply,
    proto::{
        InfoBatchGetResult, InfoBatchGetTask, InfoGetTask, InfoResult, InfoSetTask, LoginResult,
        LoginTask, UserBatchGetResult, UserBatchGetTask, UserCreateTask, UserGetTask,
        UserQueryResult, UserQueryTask, UserResult, UserSetTask, identity_server::Identity,
    },
};

/// gRPC front end of a [`Directory`].
///
/// Cheap to clone; clones share the directory, the in-flight counter and the
/// shutdown token.
#[derive(Clone)]
pub struct IdentityService {
    directory: Arc<Directory>,
    inflight: Arc<AtomicUsize>,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

/// Counts one request as in flight until dropped.
struct InflightGuard {
    inflight: Arc<AtomicUsize>,
    rpc: &'static str,
    start: Instant,
}

impl InflightGuard {
    fn enter(inflight: &Arc<AtomicUsize>, rpc: &'static str) -> Self {
        inflight.fetch_add(1, Ordering::AcqRel);
        increment_requests(rpc);
        increment_requests_inflight();
        Self {
            inflight: Arc::clone(inflight),
            rpc,
            start: Instant::now(),
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_requests_inflight();
        record_request_duration(self.rpc, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

impl IdentityService {
    pub fn new(directory: Arc<Directory>, shutdown_timeout: Duration) -> Self {
        Self {
            directory,
            inflight: Arc::new(AtomicUsize::new(0)),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Runs one directory call and wraps its outcome in the reply type `R`.
    async fn dispatch<R, F>(&self, rpc: &'static str, call: F) -> Result<Response<R>, Status>
    where
        R: Reply,
        F: Future<Output = usernode::Result<R::Payload>>,
    {
        if self.shutdown_token.is_cancelled() {
            increment_request_errors(rpc, Errno::Internal.as_str());
            return Ok(Response::new(R::failure(&Error::ServiceShutdown)));
        }

        let _guard = InflightGuard::enter(&self.inflight, rpc);
        let reply = R::from_result(call.await.map_err(Error::from));

        if let Some(errno) = Errno::from_code(reply.errno()).filter(|e| *e != Errno::Ok) {
            increment_request_errors(rpc, errno.as_str());
            #[cfg(feature = "tracing")]
            tracing::debug!(rpc, errno = errno.code(), "request failed");
        }
        Ok(Response::new(reply))
    }

    /// Initiates a graceful shutdown.
    ///
    /// New requests are refused immediately with an INTERNAL reply. In-flight
    /// requests get up to the configured timeout to finish.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new requests ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new requests");
        self.shutdown_token.cancel();

        // === Phase 1: Wait for in-flight requests to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight requests ({} active)", self.inflight());
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight requests drained successfully");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} requests still active)",
                    self.inflight()
                );
            }
        }
    }
}

#[tonic::async_trait]
impl Identity for IdentityService {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(name = %req.get_ref().name)))]
    async fn user_create(
        &self,
        req: Request<UserCreateTask>,
    ) -> Result<Response<UserResult>, Status> {
        let task = req.into_inner();
        self.dispatch("UserCreate", self.directory.create_user(task.into()))
            .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(uid = %req.get_ref().uid)))]
    async fn user_set(&self, req: Request<UserSetTask>) -> Result<Response<UserResult>, Status> {
        let task = req.into_inner();
        self.dispatch("UserSet", self.directory.set_user(task.into()))
            .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn user_get(&self, req: Request<UserGetTask>) -> Result<Response<UserResult>, Status> {
        let task = req.into_inner();
        self.dispatch("UserGet", self.directory.get_user(task.into()))
            .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn user_query(
        &self,
        req: Request<UserQueryTask>,
    ) -> Result<Response<UserQueryResult>, Status> {
        let task = req.into_inner();
        self.dispatch("UserQuery", self.directory.query_users(task.into()))
            .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(count = req.get_ref().uids.len())))]
    async fn user_batch_get(
        &self,
        req: Request<UserBatchGetTask>,
    ) -> Result<Response<UserBatchGetResult>, Status> {
        let task = req.into_inner();
        self.dispatch("UserBatchGet", self.directory.batch_get_users(&task.uids))
            .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(name = %req.get_ref().name)))]
    async fn login(&self, req: Request<LoginTask>) -> Result<Response<LoginResult>, Status> {
        let task = req.into_inner();
        self.dispatch("Login", async {
            self.directory
                .login(&task.name, &task.password)
                .await
                .map(|_| ())
        })
        .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(uid = %req.get_ref().uid, key = %req.get_ref().key)))]
    async fn info_set(&self, req: Request<InfoSetTask>) -> Result<Response<InfoResult>, Status> {
        let task = req.into_inner();
        self.dispatch("InfoSet", async {
            let info = parse_info(&task.info)?;
            self.directory.set_info(&task.uid, &task.key, info).await
        })
        .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(uid = %req.get_ref().uid, key = %req.get_ref().key)))]
    async fn info_get(&self, req: Request<InfoGetTask>) -> Result<Response<InfoResult>, Status> {
        let task = req.into_inner();
        self.dispatch("InfoGet", self.directory.get_info(&task.uid, &task.key))
            .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(count = req.get_ref().uids.len(), key = %req.get_ref().key)))]
    async fn info_batch_get(
        &self,
        req: Request<InfoBatchGetTask>,
    ) -> Result<Response<InfoBatchGetResult>, Status> {
        let task = req.into_inner();
        self.dispatch(
            "InfoBatchGet",
            self.directory.batch_get_info(&task.uids, &task.key),
        )
        .await
    }
}
