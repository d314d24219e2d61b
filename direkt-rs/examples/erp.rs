//! Example: ERP router with an audit hook and a custom action next to the built-in groups.
//!
//!   curl -s localhost:8000/api
//!   curl -s -H 'X-Login: admin' -d '{"action":"Order","method":"readOrderStatus","tid":1}' localhost:8000/router

use async_trait::async_trait;
use direkt_rs::{
    Action, ActionHandler, ActionModule, Application, Caller, ErpModule, HandlerResult, MemoryStore, Rights,
    StaticUsers,
};
use serde_json::{json, Value};

#[derive(Action)]
struct Ping {
    login: Option<String>,
}

#[async_trait]
impl ActionHandler for Ping {
    async fn invoke(&self, _method: &str, args: Vec<Value>) -> HandlerResult {
        Ok(json!({ "pong": args, "login": self.login }))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .with_writer(std::io::stderr)
        .init();

    let mut app = Application::new();
    app.register(&mut ErpModule::new().store(MemoryStore::new()))?;

    let mut ping = ActionModule::new(|caller: &Caller| Ping {
        login: caller.login().map(str::to_string),
    })
    .method_with_len("echo", 1)
    .before(|call| {
        tracing::info!(action = %call.action, method = %call.method, tid = ?call.tid, "audit");
        Ok(())
    });
    app.register(&mut ping)?;

    app.set_authenticator(StaticUsers::new().user("admin", Rights::new().grant_all("order").grant_all("category")));
    app.run_from_env("127.0.0.1", 8000)
}
