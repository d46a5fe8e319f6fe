use crate::transport::StartPosition;
use crate::{
    DEFAULT_CLIENT_ID, DEFAULT_IGNORE_OLD, DEFAULT_MAX_PUB_ACKS_INFLIGHT, DEFAULT_MESSAGE_SIZE,
    DEFAULT_NUM_MSGS, DEFAULT_NUM_PUBS, DEFAULT_NUM_SUBS,
};

/// How publishers wait on the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishMode {
    /// One blocking round trip per message.
    Sync,
    /// Fire every publish and count acknowledgements as they arrive.
    Async,
}

/// Immutable description of a single benchmark run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub subject: String,
    pub num_msgs: u64,
    pub message_size: usize,
    pub num_pubs: usize,
    pub num_subs: usize,
    pub publish_mode: PublishMode,
    pub max_pub_acks_inflight: usize,
    pub queue_group: Option<String>,
    pub ignore_old: bool,
    pub client_id: String,
}

impl RunConfig {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            num_msgs: DEFAULT_NUM_MSGS,
            message_size: DEFAULT_MESSAGE_SIZE,
            num_pubs: DEFAULT_NUM_PUBS,
            num_subs: DEFAULT_NUM_SUBS,
            publish_mode: PublishMode::Async,
            max_pub_acks_inflight: DEFAULT_MAX_PUB_ACKS_INFLIGHT,
            queue_group: None,
            ignore_old: DEFAULT_IGNORE_OLD,
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    pub fn messages(mut self, num_msgs: u64) -> Self {
        self.num_msgs = num_msgs;
        self
    }

    pub fn message_size(mut self, message_size: usize) -> Self {
        self.message_size = message_size;
        self
    }

    pub fn publishers(mut self, num_pubs: usize) -> Self {
        self.num_pubs = num_pubs;
        self
    }

    pub fn subscribers(mut self, num_subs: usize) -> Self {
        self.num_subs = num_subs;
        self
    }

    pub fn publish_mode(mut self, mode: PublishMode) -> Self {
        self.publish_mode = mode;
        self
    }

    pub fn max_pub_acks_inflight(mut self, max: usize) -> Self {
        self.max_pub_acks_inflight = max;
        self
    }

    /// An empty name disables queue grouping.
    pub fn queue_group(mut self, name: &str) -> Self {
        self.queue_group = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        self
    }

    pub fn ignore_old(mut self, ignore_old: bool) -> Self {
        self.ignore_old = ignore_old;
        self
    }

    pub fn client_id(mut self, client_id: &str) -> Self {
        self.client_id = client_id.to_string();
        self
    }

    pub fn start_position(&self) -> StartPosition {
        if self.ignore_old {
            StartPosition::NewOnly
        } else {
            StartPosition::AllAvailable
        }
    }

    pub fn publisher_id(&self, index: usize) -> String {
        format!("{}-pub-{}", self.client_id, index)
    }

    pub fn subscriber_id(&self, index: usize) -> String {
        format!("{}-sub-{}", self.client_id, index)
    }
}
