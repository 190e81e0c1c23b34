//! Integration tests for the builder: managers over real stores talking
//! to one accounts service.

use tokenward::prelude::*;

fn service() -> Arc<AccountsService<PasswordTable>> {
    let table = PasswordTable::new().with_user("alice", "u1", "hunter2");
    Arc::new(AccountsService::new(table, ServiceConfig::default()))
}

fn quiet() -> AccountsClientBuilder {
    AccountsClientBuilder::new().poll_interval(Duration::ZERO)
}

#[tokio::test]
async fn test_build_applies_key_prefix() {
    let service = service();
    let store = Arc::new(MemoryStore::new());
    let tab = quiet().key_prefix("myapp").build(&service, Arc::clone(&store));

    tab.login_with_password("alice", "hunter2").await.unwrap();

    assert!(store.get_item("myapp.loginToken").unwrap().is_some());
    assert_eq!(store.get_item("myapp.userId").unwrap().as_deref(), Some("u1"));
}

#[tokio::test]
async fn test_file_store_tabs_share_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let service = service();
    let tab_a = quiet().build_with_file(&service, &path);
    let tab_b = quiet().build_with_file(&service, &path);

    tab_a.login_with_password("alice", "hunter2").await.unwrap();
    tab_b.poll_stored_token().await;
    assert_eq!(tab_b.user_id(), Some(UserId::from("u1")));

    tab_a.logout().await.unwrap();
    tab_b.poll_stored_token().await;
    assert_eq!(tab_b.user_id(), None);
}

#[tokio::test]
async fn test_question_mark_converts_login_errors() {
    async fn login(tab: &SessionTokenManager<tokenward::LocalConnection, MemoryStore>) -> Result<(), TokenwardError> {
        tab.login_with_password("alice", "wrong").await?;
        Ok(())
    }

    let service = service();
    let tab = quiet().build(&service, MemoryStore::new());

    let err = login(&tab).await.unwrap_err();
    assert!(matches!(err, TokenwardError::Login(LoginError::Remote(_))));
}

#[tokio::test]
async fn test_url_fragment_link_suspends_auto_login() {
    let service = service();
    let tab = quiet()
        .url_fragment("#/enroll-account/xyz")
        .build(&service, MemoryStore::new());
    assert!(!tab.auto_login_enabled());
}
