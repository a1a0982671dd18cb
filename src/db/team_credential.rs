use chrono::{DateTime, Utc};
use derive_more::Display;
use serde_derive::{Serialize, Deserialize};

/// Bot token granted to a team by the installation flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display)]
#[display("TeamCredential ({team_id}, bot user: {bot_user_id:?})")]
pub struct TeamCredential {
    pub team_id: String,
    pub access_token: String,

    #[serde(default)]
    pub bot_user_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub enterprise_id: Option<String>,

    pub installed_at: DateTime<Utc>,
}

impl TeamCredential {
    pub fn new(team_id: impl Into<String>, access_token: impl Into<String>) -> TeamCredential {
        TeamCredential {
            team_id: team_id.into(),
            access_token: access_token.into(),
            bot_user_id: None,
            scope: None,
            enterprise_id: None,
            installed_at: Utc::now(),
        }
    }
}
