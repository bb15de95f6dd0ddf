use std::fmt;
use std::str::FromStr;

/// Screens of the client. `Chat` carries the channel it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Signup,
    Home,
    Chat(String),
}

impl Route {
    pub fn start(signed_in: bool) -> Self {
        if signed_in { Route::Home } else { Route::Login }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => f.write_str("login"),
            Route::Signup => f.write_str("signup"),
            Route::Home => f.write_str("home"),
            Route::Chat(channel_id) => write!(f, "chat/{channel_id}"),
        }
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "login" => Ok(Route::Login),
            "signup" => Ok(Route::Signup),
            "home" => Ok(Route::Home),
            other => match other.strip_prefix("chat/") {
                Some(channel_id) if !channel_id.is_empty() => {
                    Ok(Route::Chat(channel_id.to_string()))
                }
                _ => Err(format!("unknown route `{other}`")),
            },
        }
    }
}
