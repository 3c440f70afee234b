//! Radio control state machine states, numbered after the datasheet FSM
//! diagram (figure 30).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RadioState {
    VregOff,
    PowerDown,
    Idle,
    RxCalibrate,
    RxSfdSearch,
    RxWait,
    RxFrame,
    RxOverflow,
    TxCalibrate,
    TxPreamble,
    TxFrame,
    TxAckCalibrate,
    TxAckPreamble,
    TxAck,
    /// Reachable on real silicon but never entered by this model; kept so
    /// the FSM numbering stays complete.
    TxUnderflow,
}

impl RadioState {
    /// Numeric FSM code as reported in FSMSTAT0.
    pub fn fsm_code(self) -> i32 {
        match self {
            RadioState::VregOff => -2,
            RadioState::PowerDown => -1,
            RadioState::Idle => 0,
            RadioState::RxCalibrate => 2,
            RadioState::RxSfdSearch => 3,
            RadioState::RxWait => 14,
            RadioState::RxFrame => 15,
            RadioState::RxOverflow => 17,
            RadioState::TxCalibrate => 32,
            RadioState::TxPreamble => 34,
            RadioState::TxFrame => 37,
            RadioState::TxAckCalibrate => 48,
            RadioState::TxAckPreamble => 49,
            RadioState::TxAck => 52,
            RadioState::TxUnderflow => 56,
        }
    }

    /// True for every state of the receive pipeline. Several strobes are
    /// only legal from these.
    pub fn is_rx(self) -> bool {
        matches!(
            self,
            RadioState::RxCalibrate
                | RadioState::RxSfdSearch
                | RadioState::RxWait
                | RadioState::RxFrame
                | RadioState::RxOverflow
        )
    }

    /// True while a frame is actively on the air in either direction.
    pub fn frame_in_progress(self) -> bool {
        matches!(
            self,
            RadioState::RxFrame | RadioState::TxFrame | RadioState::TxAck
        )
    }
}
