use serde::{Deserialize, Serialize};

/// Display identity reported by the platform for a verified credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformIdentity {
    pub user_id: String,
    pub username: String,
    pub avatar_url: String,
}

/// Body of the platform's "current user" endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformUserResponse {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl PlatformIdentity {
    pub fn from_user_response(response: PlatformUserResponse, cdn_base: &str) -> Self {
        let cdn_base = cdn_base.trim_end_matches('/');
        let discriminator = response
            .discriminator
            .as_deref()
            .filter(|d| !d.is_empty() && *d != "0");

        let username = match discriminator {
            Some(d) => format!("{}#{}", response.username, d),
            None => response.username.clone(),
        };

        let avatar_url = match response.avatar.as_deref().filter(|a| !a.is_empty()) {
            Some(hash) => format!("{}/avatars/{}/{}.png", cdn_base, response.id, hash),
            None => {
                let index = discriminator
                    .and_then(|d| d.parse::<u32>().ok())
                    .map(|d| d % 5)
                    .unwrap_or(0);
                format!("{}/embed/avatars/{}.png", cdn_base, index)
            }
        };

        Self {
            user_id: response.id,
            username,
            avatar_url,
        }
    }
}
