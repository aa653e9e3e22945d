use anyhow::Context;
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;
use std::time::Duration;

use spin_wheel::{
    config::Config,
    external::{LogSurface, ManualIdentity},
    handlers::{self, Action},
    models::{FundRequestInput, RequestKind},
    services::{AccountService, ApprovalService, SpinSession},
    store::MemoryStore,
    tasks,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().context("Failed to load configuration")?;

    // 内存版实时文档库，代替托管数据库
    let store = MemoryStore::new();
    let identity = ManualIdentity::new();
    let session = SpinSession::new(config.clone(), store.clone(), store.clone(), Arc::new(LogSurface))
        .context("Failed to build spin session")?;
    let admin = ApprovalService::new(store.clone(), store.clone());

    let listener = tasks::spawn_all(session.clone(), &identity);

    // 邀请人账户，已存在
    AccountService::new(store.clone(), &config.ledger)
        .create("inviter-001", "inviter@mail.com", None)
        .await
        .context("Failed to seed inviter account")?;

    log::info!("Demo: signing in a new player referred by inviter-001");
    identity.sign_in("player-42", "player@mail.com", Some("inviter-001"));
    pause().await;

    run(&session, Action::Account).await;
    run(&session, Action::FreeSpin).await;
    run(&session, Action::Spin).await;

    let payee = |amount| FundRequestInput {
        account_holder: "Demo Player".to_string(),
        account_number: "03001234567".to_string(),
        amount,
    };

    let deposit = run(&session, Action::Deposit(payee(2500))).await;
    if let Some(id) = deposit
        .data
        .as_ref()
        .and_then(|d| d.get("id"))
        .and_then(|v| v.as_str())
    {
        admin
            .approve(RequestKind::Deposit, id)
            .await
            .context("Admin approval failed")?;
    }
    pause().await;

    run(&session, Action::Spin).await;
    run(&session, Action::BundleSpin).await;

    // 另一位好友通过本玩家的邀请码注册，本玩家获得免费次数
    AccountService::new(store.clone(), &config.ledger)
        .create("friend-7", "friend@mail.com", Some("player-42"))
        .await
        .context("Failed to create referred friend")?;
    pause().await;
    run(&session, Action::Account).await;

    run(&session, Action::Withdraw(payee(1000))).await;
    run(&session, Action::Withdraw(payee(1000))).await;
    run(
        &session,
        Action::History {
            kind: RequestKind::Withdrawal,
            status: None,
        },
    )
    .await;

    identity.sign_out();
    pause().await;
    run(&session, Action::Spin).await;

    listener.abort();
    Ok(())
}

async fn run(
    session: &SpinSession<MemoryStore, MemoryStore>,
    action: Action,
) -> spin_wheel::models::StatusMessage {
    let status = handlers::handle_action(session, action).await;
    log::info!("{}", serde_json::to_string(&status).unwrap_or_else(|_| status.message.clone()));
    status
}

async fn pause() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
