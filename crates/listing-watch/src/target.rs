//! Feed targets: listing path, item event name, and polling strategy

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::strategy::{FeedStrategy, ListingStrategy, PollStrategy};

/// Shortest allowed poll interval (at most 10 watcher requests per minute).
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(6);

/// Poll interval for a requests-per-minute budget, clamped to `MIN_POLL_INTERVAL`.
pub fn poll_interval(requests_per_minute: u32) -> Duration {
    let rpm = requests_per_minute.max(1);
    let interval = Duration::from_millis(60_000 / u64::from(rpm));
    if interval < MIN_POLL_INTERVAL {
        warn!(
            requests_per_minute,
            interval_ms = MIN_POLL_INTERVAL.as_millis() as u64,
            "watcher request rate above 10 per minute, clamping"
        );
        return MIN_POLL_INTERVAL;
    }
    interval
}

/// Sort order of a non-chronological listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSort {
    Hot,
    Rising,
    Controversial,
    New,
    /// `top_<window>`, e.g. `top_week`
    Top(String),
}

impl ListingSort {
    fn path(&self) -> String {
        match self {
            ListingSort::Hot => "hot.json".into(),
            ListingSort::Rising => "rising.json".into(),
            ListingSort::Controversial => "controversial.json".into(),
            ListingSort::New => "new.json".into(),
            ListingSort::Top(window) => format!("top.json?sort=top&t={window}"),
        }
    }
}

impl FromStr for ListingSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "hot" => Ok(ListingSort::Hot),
            "rising" => Ok(ListingSort::Rising),
            "controversial" => Ok(ListingSort::Controversial),
            "new" => Ok(ListingSort::New),
            other => match other.strip_prefix("top_") {
                Some(window) if !window.is_empty() => Ok(ListingSort::Top(window.to_string())),
                _ => Err(Error::InvalidListing(s.to_string())),
            },
        }
    }
}

impl fmt::Display for ListingSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingSort::Hot => f.write_str("hot"),
            ListingSort::Rising => f.write_str("rising"),
            ListingSort::Controversial => f.write_str("controversial"),
            ListingSort::New => f.write_str("new"),
            ListingSort::Top(window) => write!(f, "top_{window}"),
        }
    }
}

/// What a watcher polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedTarget {
    Comments { subreddit: String },
    Posts { subreddit: String },
    Multi { user: String, multi: String },
    Listing {
        subreddit: Option<String>,
        sort: ListingSort,
        limit: usize,
    },
}

impl FeedTarget {
    pub fn comments(subreddit: &str) -> Self {
        FeedTarget::Comments {
            subreddit: clean(subreddit),
        }
    }

    pub fn posts(subreddit: &str) -> Self {
        FeedTarget::Posts {
            subreddit: clean(subreddit),
        }
    }

    pub fn multi(user: &str, multi: &str) -> Self {
        FeedTarget::Multi {
            user: clean(user),
            multi: clean(multi),
        }
    }

    /// `subreddit` empty or `None` polls the front page.
    pub fn listing(subreddit: Option<&str>, sort: &str, limit: usize) -> Result<Self> {
        Ok(FeedTarget::Listing {
            subreddit: subreddit.map(clean).filter(|s| !s.is_empty()),
            sort: sort.parse()?,
            limit,
        })
    }

    /// Listing path relative to the source origin.
    pub fn path(&self) -> String {
        match self {
            FeedTarget::Comments { subreddit } => format!("r/{subreddit}/comments.json"),
            FeedTarget::Posts { subreddit } => format!("r/{subreddit}/new.json"),
            FeedTarget::Multi { user, multi } => format!("user/{user}/m/{multi}/new.json"),
            FeedTarget::Listing {
                subreddit, sort, ..
            } => match subreddit {
                Some(subreddit) => format!("r/{subreddit}/{}", sort.path()),
                None => sort.path(),
            },
        }
    }

    /// Event name subscribers use for items of this target.
    pub fn item_event(&self) -> &'static str {
        match self {
            FeedTarget::Comments { .. } => "comment",
            FeedTarget::Posts { .. } | FeedTarget::Multi { .. } => "post",
            FeedTarget::Listing { .. } => "item",
        }
    }

    pub fn strategy(&self) -> Box<dyn PollStrategy> {
        match self {
            FeedTarget::Listing { limit, .. } => Box::new(ListingStrategy::new(*limit)),
            _ => Box::new(FeedStrategy::new()),
        }
    }
}

impl fmt::Display for FeedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedTarget::Comments { subreddit } => write!(f, "comments:r/{subreddit}"),
            FeedTarget::Posts { subreddit } => write!(f, "posts:r/{subreddit}"),
            FeedTarget::Multi { user, multi } => write!(f, "multi:{user}/{multi}"),
            FeedTarget::Listing {
                subreddit, sort, ..
            } => match subreddit {
                Some(subreddit) => write!(f, "listing:r/{subreddit}/{sort}"),
                None => write!(f, "listing:{sort}"),
            },
        }
    }
}

fn clean(name: &str) -> String {
    name.trim().replace('/', "")
}
