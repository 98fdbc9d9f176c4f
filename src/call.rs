#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Cab,
    HallUp,
    HallDown,
}

impl Call {
    pub fn as_str(self) -> &'static str {
        match self {
            Call::Cab => "cab",
            Call::HallUp => "hall up",
            Call::HallDown => "hall down",
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}
