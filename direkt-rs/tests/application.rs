use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use direkt_core::{Authenticator, CallBatch, CallDescriptor};
use direkt_rs::{
    Action, ActionHandler, ActionModule, Application, Caller, CoreError, HandlerResult, Operation, StaticUsers,
};
use serde_json::{json, Value};

#[derive(Action)]
struct Greeter;

#[derive(Action)]
#[action(name = "Stock")]
struct StockHandler;

#[async_trait]
impl ActionHandler for Greeter {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> HandlerResult {
        Ok(json!({ "method": method, "args": args }))
    }
}

#[test]
fn derive_names_actions() {
    assert_eq!(<Greeter as Action>::name(), "Greeter");
    assert_eq!(<StockHandler as Action>::name(), "Stock");
}

#[tokio::test]
async fn module_hooks_wrap_handler() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let mut module = ActionModule::new(|_: &Caller| Greeter)
        .method_with_len("hello", 1)
        .before(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .after(|_, result| {
            result["stamped"] = json!(true);
            Ok(())
        });
    assert_eq!(module.name(), "Greeter");

    let mut app = Application::new();
    app.register(&mut module).unwrap();
    assert!(matches!(app.register(&mut module), Err(CoreError::Registration(_))));

    let app = app.build();
    let call = CallDescriptor::new("Greeter", "hello", json!(["world"])).with_tid(1);
    let reply = app
        .dispatcher()
        .handle(CallBatch::from(call), &Caller::anonymous())
        .await;
    let env = &reply.envelopes()[0];
    assert_eq!(
        env.result(),
        Some(&json!({"method": "hello", "args": ["world"], "stamped": true}))
    );
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn before_hook_can_veto() {
    let mut module = ActionModule::named("Locked", |_: &Caller| Greeter)
        .method("open")
        .before(|call| Err(CoreError::Hook(format!("{} is locked", call.action))));
    let mut app = Application::new();
    app.register(&mut module).unwrap();
    let app = app.build();
    let env = app
        .dispatcher()
        .dispatch(&CallDescriptor::new("Locked", "open", Value::Null), &Caller::anonymous())
        .await;
    assert_eq!(env.message(), Some("Locked is locked"));
}

#[test]
fn api_descriptor_reflects_paths_and_namespace() {
    let mut app = Application::new();
    app.set_server_config(direkt_rs::ServerConfig::default().with_paths("/erp/router", "erp/api"));
    app.set_router_config(direkt_rs::RouterConfig {
        namespace: Some("Erp".into()),
        ..Default::default()
    });
    app.register(&mut ActionModule::new(|_: &Caller| Greeter).method("hello"))
        .unwrap();
    assert_eq!(
        app.api_descriptor(),
        json!({
            "url": "/erp/router",
            "type": "remoting",
            "namespace": "Erp",
            "actions": {"Greeter": [{"name": "hello"}]}
        })
    );
}

#[test]
fn env_configuration_keeps_settings_made_in_code() {
    let mut app = Application::new();
    app.set_server_config(direkt_rs::ServerConfig::default().with_paths("erp/router", "erp/api"));
    app.set_router_config(direkt_rs::RouterConfig {
        debug: false,
        namespace: Some("Erp".into()),
        ..direkt_rs::RouterConfig::default().with_versions("3.5", "3.4").unwrap()
    });
    app.configure_from_env("0.0.0.0", 9100).unwrap();

    let router = app.router_config();
    assert!(!router.debug);
    assert_eq!(router.namespace.as_deref(), Some("Erp"));
    assert!(router.host_version.is_some() && router.min_host_version.is_some());
    assert_eq!(app.server_config().path, "erp/router");
    assert_eq!(app.server_config().api_path, "erp/api");
}

#[tokio::test]
async fn static_users_from_json() {
    let users = StaticUsers::from_json(r#"{"clerk": {"order": ["read", "create"], "category": ["read"]}}"#).unwrap();
    assert_eq!(users.len(), 1);

    let headers = vec![("X-Login".to_string(), " clerk ".to_string())];
    let caller = users.authenticate(&headers).await;
    assert_eq!(caller.login(), Some("clerk"));
    assert!(caller.can("order", Operation::Create));
    assert!(!caller.can("order", Operation::Delete));
    assert!(caller.can("category", Operation::Read));
    assert!(!caller.can("category", Operation::Update));

    let stranger = users
        .authenticate(&[("x-login".to_string(), "mallory".to_string())])
        .await;
    assert!(!stranger.is_authenticated());
    assert!(!users.authenticate(&[]).await.is_authenticated());

    assert!(StaticUsers::from_json(r#"{"clerk": {"order": ["fly"]}}"#).is_err());
    assert!(StaticUsers::from_json(r#"{"clerk": ["read"]}"#).is_err());
    assert!(StaticUsers::from_file(std::path::Path::new("/nonexistent/users.json")).is_err());
}
