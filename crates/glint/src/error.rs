use thiserror::Error;

use crate::state::ShaderStage;

///Deferred shader trouble. Creation never fails synchronously, so compile and
///link problems surface a frame later through the handle shells, carrying
///this.
#[derive(Error, Debug, Clone)]
pub enum ShaderFailure {
    #[error("{stage:?} shader '{desc}' failed to compile: {log}")]
    Compile {
        stage: ShaderStage,
        desc: String,
        log: String,
    },
    #[error("program link failed: {log}")]
    Link { log: String },
}

#[cfg(test)]
mod test {
    use static_assertions::assert_impl_all;

    use crate::ShaderFailure;

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(ShaderFailure: Send, Sync);
    }
}
