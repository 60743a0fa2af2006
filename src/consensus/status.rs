use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Round in flight, or nothing launched yet.
pub const INIT: i64 = -1;
/// The last round missed a quorum and the coordinator should try again.
pub const RETRY: i64 = 99;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Running,
    Retry,
    Winner(i64),
    Other(i64),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Running => write!(f, "running({INIT})"),
            Status::Retry => write!(f, "retry({RETRY})"),
            Status::Winner(code) => write!(f, "winner({code})"),
            Status::Other(code) => write!(f, "unknown({code})"),
        }
    }
}

/// The election status cell shared by the coordinator and every proposer.
///
/// Winner codes are terminal: once one is stored no later write replaces it,
/// so a late failing round cannot hide a chairman from the coordinator.
///
/// The cell also carries the number of the current launch. A round may only
/// report RETRY for the launch it was started in; a straggler from an earlier
/// launch cannot spend another retry. Code and launch share one atomic word.
#[derive(Debug)]
pub struct ElectionStatus {
    cell: AtomicU64,
    winners: Vec<i64>,
}

fn pack(launch: u32, code: i64) -> u64 {
    (u64::from(launch) << 32) | u64::from(code as i32 as u32)
}

fn unpack(cell: u64) -> (u32, i64) {
    ((cell >> 32) as u32, i64::from(cell as u32 as i32))
}

impl ElectionStatus {
    pub fn new(winners: Vec<i64>) -> Self {
        ElectionStatus {
            cell: AtomicU64::new(pack(0, INIT)),
            winners,
        }
    }

    pub fn code(&self) -> i64 {
        unpack(self.cell.load(Ordering::SeqCst)).1
    }

    /// Launch the cell is currently in. Starts at 0.
    pub fn launch(&self) -> u32 {
        unpack(self.cell.load(Ordering::SeqCst)).0
    }

    pub fn get(&self) -> Status {
        self.classify(self.code())
    }

    pub fn is_winner_code(&self, code: i64) -> bool {
        self.winners.contains(&code)
    }

    /// Starts the next launch and marks it in flight. Returns false if a winner is already set.
    pub fn begin_round(&self) -> bool {
        self.update(|launch, _| Some(pack(launch.wrapping_add(1), INIT)))
    }

    /// Records a failed round of `launch`. Returns false if a winner is
    /// already set or `launch` is no longer current.
    pub fn fail_round(&self, launch: u32) -> bool {
        self.update(|current, _| (current == launch).then(|| pack(current, RETRY)))
    }

    /// Records `code` as the winner if no winner has been recorded yet.
    pub fn declare_winner(&self, code: i64) -> bool {
        if !self.is_winner_code(code) {
            return false;
        }
        self.update(|launch, _| Some(pack(launch, code)))
    }

    fn update(&self, next: impl Fn(u32, i64) -> Option<u64>) -> bool {
        self.cell
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cell| {
                let (launch, code) = unpack(cell);
                if self.is_winner_code(code) {
                    None
                } else {
                    next(launch, code)
                }
            })
            .is_ok()
    }

    fn classify(&self, code: i64) -> Status {
        match code {
            INIT => Status::Running,
            RETRY => Status::Retry,
            code if self.is_winner_code(code) => Status::Winner(code),
            code => Status::Other(code),
        }
    }
}
