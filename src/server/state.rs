use crate::ocr::EngineSlot;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) engine: EngineSlot,
    pub(crate) max_side: u32,
}
