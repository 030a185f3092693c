//! Tool listing.

use super::serve::Registries;
use blogspot_auth::{AuthSession, ClientCredentials, CredentialStore};
use blogspot_blogger::{BloggerClient, BloggerTools};
use std::sync::Arc;

/// Print the operations the server registers.
///
/// Builds the registrations against an unauthenticated session; nothing
/// is sent over the network and no configuration is read.
pub async fn list_tools() -> anyhow::Result<()> {
    let registries = registered().await?;

    println!("Tools:");
    for tool in registries.tools.list().await {
        println!(
            "  {:<20} {}",
            tool.name,
            tool.description.unwrap_or_default()
        );
    }

    println!();
    println!("Resources:");
    for resource in registries.resources.list().await {
        println!("  {:<20} {}", resource.name, resource.uri);
    }

    println!();
    println!("Prompts:");
    for prompt in registries.prompts.list().await {
        println!(
            "  {:<20} {}",
            prompt.name,
            prompt.description.unwrap_or_default()
        );
    }
    Ok(())
}

async fn registered() -> anyhow::Result<Registries> {
    let session = Arc::new(AuthSession::blogger(ClientCredentials {
        client_id: String::new(),
        client_secret: String::new(),
    }));
    let client = Arc::new(BloggerClient::new(session.clone()));
    let registries = Registries::default();
    Arc::new(BloggerTools::new(
        client,
        session,
        Arc::new(CredentialStore::new()),
    ))
    .register(&registries.tools, &registries.resources, &registries.prompts)
    .await?;
    Ok(registries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catalog_is_complete() {
        let registries = registered().await.unwrap();
        assert_eq!(registries.tools.len().await, 5);
        assert_eq!(registries.resources.len().await, 1);
        assert_eq!(registries.prompts.len().await, 1);

        let summary = registries.tools.manager_stats().await;
        assert_eq!(summary.by_service.get("blogger"), Some(&5));
    }
}
