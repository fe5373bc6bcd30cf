// Remote-address allow-list checked before the websocket upgrade.

use std::net::IpAddr;

#[derive(Debug, Clone, Default)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| entry.as_ref().trim().to_ascii_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    /// An empty list admits everyone. `localhost` matches any loopback address.
    pub fn allows(&self, ip: IpAddr) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        let ip = ip.to_canonical();
        self.entries.iter().any(|entry| match entry.as_str() {
            "localhost" => ip.is_loopback(),
            other => other
                .parse::<IpAddr>()
                .map(|allowed| allowed.to_canonical() == ip)
                .unwrap_or(false),
        })
    }
}
