use chrono::Utc;
use parking_lot::Mutex;

const NODE_ID_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE_ID: u64 = (1 << NODE_ID_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

// 2024-01-01T00:00:00Z
const START_TIME_MILLIS: u64 = 1_704_067_200_000;

/// 64位分布式 ID 生成器（时间戳41位 + 节点10位 + 序列12位）
#[derive(Debug)]
pub struct Snowflake {
    node_id: u64,
    state: Mutex<SnowflakeState>,
}

#[derive(Debug, Default)]
struct SnowflakeState {
    last_time_millis: u64,
    sequence: u64,
}

impl Snowflake {
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: u64::from(node_id) & MAX_NODE_ID,
            state: Mutex::new(SnowflakeState::default()),
        }
    }

    pub fn next_id(&self) -> i64 {
        let mut state = self.state.lock();
        let mut now = current_millis();

        // Clock went backwards: keep issuing ids from the last seen millisecond.
        if now < state.last_time_millis {
            now = state.last_time_millis;
        }

        if now == state.last_time_millis {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            // Sequence exhausted: borrow the next millisecond instead of spinning.
            if state.sequence == 0 {
                now = state.last_time_millis + 1;
            }
        } else {
            state.sequence = 0;
        }

        state.last_time_millis = now;

        let id = ((now - START_TIME_MILLIS) << (NODE_ID_BITS + SEQUENCE_BITS))
            | (self.node_id << SEQUENCE_BITS)
            | state.sequence;
        id as i64
    }
}

fn current_millis() -> u64 {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    millis.max(START_TIME_MILLIS)
}
