use agentcore::error::AgentCoreError;
use agentcore::persistence::{
    FilePersistenceProvider, PersistenceConfig, PersistenceKind, PersistenceProvider,
    TemporaryPersistenceProvider,
};

async fn exercise(provider: &dyn PersistenceProvider) -> anyhow::Result<()> {
    provider.save("a", "first".to_string()).await?;
    provider.save("a", "second".to_string()).await?;
    provider.save("b", "other".to_string()).await?;
    assert_eq!(provider.load("a").await?.as_deref(), Some("second"));

    provider.delete(&["a".to_string()]).await?;
    assert_eq!(provider.load("a").await?, None);
    assert_eq!(provider.load("b").await?.as_deref(), Some("other"));

    provider.clear().await?;
    assert_eq!(provider.load("b").await?, None);
    Ok(())
}

#[tokio::test]
async fn temporary_provider_keeps_last_write() -> anyhow::Result<()> {
    exercise(&TemporaryPersistenceProvider::new()).await
}

#[tokio::test]
async fn file_provider_keeps_last_write() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    exercise(&FilePersistenceProvider::new(dir.path().join("flows"))).await
}

#[tokio::test]
async fn file_provider_rejects_path_like_ids() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let provider = FilePersistenceProvider::new(dir.path());
    let err = provider
        .save("../escape", "x".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentCoreError::Persistence(_)));
    Ok(())
}

#[tokio::test]
async fn config_builds_the_selected_provider() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = PersistenceConfig {
        kind: PersistenceKind::File,
        dir: dir.path().to_path_buf(),
        ..PersistenceConfig::default()
    };
    let provider = config.build()?;
    provider.save("flow", "{}".to_string()).await?;
    assert!(dir.path().join("flow.data").exists());
    assert_eq!("memory".parse::<PersistenceKind>()?, PersistenceKind::Temporary);
    Ok(())
}
