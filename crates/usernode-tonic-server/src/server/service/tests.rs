use super::handler::IdentityService;
use core::time::Duration;
use serde_json::{Value, json};
use std::sync::Arc;
use tonic::Request;
use usernode::{
    Directory, DirectoryConfig, IdNode,
    store::{
        Document, DocumentStore, Filter, FindOptions, IndexSpec, MemoryStore, Namespace,
        StoreError, Update,
    },
};
use usernode_tonic_core::proto::{
    InfoBatchGetTask, InfoGetTask, InfoSetTask, LoginTask, UserBatchGetTask, UserCreateTask,
    UserGetTask, UserQueryTask, UserSetTask, identity_server::Identity,
};

async fn service() -> IdentityService {
    let node = IdNode::new(1, 1).unwrap();
    let config = DirectoryConfig::new(node, "usernode", "secret").with_prefix("t_");
    let directory = Directory::new(config, Arc::new(MemoryStore::new()));
    directory.init().await.unwrap();
    IdentityService::new(Arc::new(directory), Duration::from_millis(200))
}

/// A store whose backend is unreachable.
struct Unreachable;

#[tonic::async_trait]
impl DocumentStore for Unreachable {
    async fn find(
        &self,
        _: &Namespace,
        _: &Filter,
        _: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::backend("server selection timeout"))
    }

    async fn find_one(&self, _: &Namespace, _: &Filter) -> Result<Option<Document>, StoreError> {
        Err(StoreError::backend("server selection timeout"))
    }

    async fn find_one_and_update(
        &self,
        _: &Namespace,
        _: &Filter,
        _: &Update,
        _: bool,
    ) -> Result<Option<Document>, StoreError> {
        Err(StoreError::backend("server selection timeout"))
    }

    async fn insert_one(&self, _: &Namespace, _: Document) -> Result<(), StoreError> {
        Err(StoreError::backend("server selection timeout"))
    }

    async fn count(&self, _: &Namespace, _: &Filter) -> Result<u64, StoreError> {
        Err(StoreError::backend("server selection timeout"))
    }

    async fn ensure_indexes(&self, _: &Namespace, _: &[IndexSpec]) -> Result<(), StoreError> {
        Err(StoreError::backend("server selection timeout"))
    }
}

fn unreachable_service() -> IdentityService {
    let node = IdNode::new(1, 1).unwrap();
    let config = DirectoryConfig::new(node, "usernode", "secret");
    let directory = Directory::new(config, Arc::new(Unreachable));
    IdentityService::new(Arc::new(directory), Duration::from_millis(200))
}

fn create(name: &str, password: &str) -> Request<UserCreateTask> {
    Request::new(UserCreateTask {
        name: name.into(),
        password: password.into(),
        ..Default::default()
    })
}

#[tokio::test]
async fn create_then_login() {
    let svc = service().await;
    let created = svc.user_create(create("alice", "pw")).await.unwrap().into_inner();
    assert_eq!(created.errno, 200);
    let user = created.user.unwrap();
    assert_eq!(user.name, "alice");
    assert!(!user.id.is_empty());

    let ok = svc
        .login(Request::new(LoginTask {
            name: "alice".into(),
            password: "pw".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!((ok.errno, ok.errmsg.as_str()), (200, ""));

    let denied = svc
        .login(Request::new(LoginTask {
            name: "alice".into(),
            password: "nope".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(denied.errno, 601);
}

#[tokio::test]
async fn failures_travel_in_the_reply() {
    let svc = service().await;
    let missing = svc.user_create(create("", "")).await.unwrap().into_inner();
    assert_eq!(missing.errno, 400);
    assert!(missing.user.is_none());

    svc.user_create(create("bob", "")).await.unwrap();
    let dup = svc.user_create(create("bob", "")).await.unwrap().into_inner();
    assert_eq!(dup.errno, 600);

    let unknown = svc
        .user_get(Request::new(UserGetTask {
            uid: "nobody".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(unknown.errno, 404);
}

#[tokio::test]
async fn user_get_auto_creates_by_name() {
    let svc = service().await;
    let task = || {
        Request::new(UserGetTask {
            name: "carol".into(),
            auto_create: true,
            ..Default::default()
        })
    };
    let first = svc.user_get(task()).await.unwrap().into_inner();
    let second = svc.user_get(task()).await.unwrap().into_inner();
    assert_eq!(first.errno, 200);
    assert_eq!(first.user.unwrap().id, second.user.unwrap().id);
}

#[tokio::test]
async fn user_set_clears_nick() {
    let svc = service().await;
    let uid = svc
        .user_create(Request::new(UserCreateTask {
            name: "dave".into(),
            nick: "d".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner()
        .user
        .unwrap()
        .id;

    let reply = svc
        .user_set(Request::new(UserSetTask {
            uid,
            nick: Some(String::new()),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.errno, 200);
    assert_eq!(reply.user.unwrap().nick, "");
}

#[tokio::test]
async fn query_and_batch_get() {
    let svc = service().await;
    let mut ids = Vec::new();
    for name in ["erin", "frank", "gina"] {
        let user = svc.user_create(create(name, "")).await.unwrap().into_inner();
        ids.push(user.user.unwrap().id);
    }

    let page = svc
        .user_query(Request::new(UserQueryTask { p: 1, n: 2, q: String::new() }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(page.errno, 200);
    assert_eq!(page.items.len(), 2);
    let descriptor = page.page.unwrap();
    assert_eq!((descriptor.total_count, descriptor.page_count), (3, 2));

    let batch = svc
        .user_batch_get(Request::new(UserBatchGetTask {
            uids: vec![ids[2].clone(), "missing".into(), ids[0].clone()],
        }))
        .await
        .unwrap()
        .into_inner();
    let names: Vec<Option<String>> = batch
        .items
        .into_iter()
        .map(|entry| entry.user.map(|u| u.name))
        .collect();
    assert_eq!(
        names,
        vec![Some("gina".into()), None, Some("erin".into())]
    );
}

#[tokio::test]
async fn info_round_trip() {
    let svc = service().await;
    let set = |info: &str| {
        Request::new(InfoSetTask {
            uid: "u1".into(),
            key: "prefs".into(),
            info: info.into(),
        })
    };

    let first = svc.info_set(set(r#"{"theme":"dark"}"#)).await.unwrap().into_inner();
    assert_eq!(first.errno, 200);
    let second = svc.info_set(set(r#"{"lang":"en"}"#)).await.unwrap().into_inner();
    let merged: Value = serde_json::from_str(&second.info.unwrap().info).unwrap();
    assert_eq!(merged, json!({"theme": "dark", "lang": "en"}));

    let got = svc
        .info_get(Request::new(InfoGetTask {
            uid: "u1".into(),
            key: "prefs".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    let stored: Value = serde_json::from_str(&got.info.unwrap().info).unwrap();
    assert_eq!(stored, merged);

    let bad = svc.info_set(set("[1, 2]")).await.unwrap().into_inner();
    assert_eq!(bad.errno, 400);

    let batch = svc
        .info_batch_get(Request::new(InfoBatchGetTask {
            uids: vec!["u1".into(), "u2".into()],
            key: "prefs".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(batch.errno, 200);
    assert!(batch.items[0].info.is_some());
    assert!(batch.items[1].info.is_none());
}

#[tokio::test]
async fn refuses_requests_after_shutdown() {
    let svc = service().await;
    svc.shutdown().await;
    assert_eq!(svc.inflight(), 0);

    let reply = svc.user_create(create("late", "")).await.unwrap().into_inner();
    assert_eq!(reply.errno, 500);
    assert_eq!(reply.errmsg, "service is shutting down");
}

#[tokio::test]
async fn store_outage_is_errno_500() {
    let svc = unreachable_service();

    let created = svc.user_create(create("zed", "")).await.unwrap().into_inner();
    assert_eq!(created.errno, 500);
    assert!(created.user.is_none());

    let batch = svc
        .info_batch_get(Request::new(InfoBatchGetTask {
            uids: vec!["u1".into(), "u2".into()],
            key: "prefs".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(batch.errno, 500);
    assert!(batch.items.is_empty());
    assert!(!batch.errmsg.is_empty());
}

#[tokio::test]
async fn dashed_uids_are_errno_400() {
    let svc = service().await;
    let reply = svc
        .info_set(Request::new(InfoSetTask {
            uid: "abcd-x".into(),
            key: "y".into(),
            info: r#"{"a": 1}"#.into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.errno, 400);
}
