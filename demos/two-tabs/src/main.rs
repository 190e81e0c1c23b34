use tokenward::LocalConnection;
use tokenward::prelude::*;
use tracing::info;

type Tab = SessionTokenManager<LocalConnection, FileStore>;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Waits until `tab` shows `expected` as the current user.
async fn wait_for_user(tab: &Tab, expected: Option<UserId>) -> Result<(), Box<dyn std::error::Error>> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while tab.user_id() != expected {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await?;
    Ok(())
}

fn open_tab(name: &'static str, service: &Arc<AccountsService<PasswordTable>>, path: &std::path::Path) -> Tab {
    let tab = AccountsClientBuilder::new()
        .poll_interval(POLL_INTERVAL)
        .build_with_file(service, path);
    tab.on_login(move || info!(tab = name, "logged in"));
    tab.on_login_failure(move |err| info!(tab = name, error = %err, "login failed"));
    tab
}

// ---------------------------------------------------------------------------
// Demo
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("session.json");
    info!(path = %path.display(), "tabs share this session file");

    let table = PasswordTable::new().with_user("alice", "u1", "hunter2");
    let service = Arc::new(AccountsService::new(table, ServiceConfig::default()));
    let _sweep = service.spawn_expiry_sweep();

    let tab_a = open_tab("A", &service, &path);
    let tab_b = open_tab("B", &service, &path);
    tab_a.start().await?;
    tab_b.start().await?;

    info!("tab A logs in as alice");
    tab_a.login_with_password("alice", "hunter2").await?;
    wait_for_user(&tab_b, Some(UserId::from("u1"))).await?;
    info!(user = ?tab_b.user_id(), "tab B picked up the login");

    info!("tab A logs out");
    tab_a.logout().await?;
    wait_for_user(&tab_b, None).await?;
    info!("tab B followed the logout");

    Ok(())
}
