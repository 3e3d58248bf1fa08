mod headless;

use anyhow::Result;

use crate::options::LogFormat;

pub(crate) struct Options {
    pub verbose: bool,
    pub color: bool,
    pub format: LogFormat,
}

pub(crate) trait Frontend {
    fn set_up(&mut self, options: &Options) -> Result<()>;
}

/// Install the global subscriber. Fails if one is already installed.
pub(crate) fn set_up(options: Options) -> Result<()> {
    let mut logger = headless::HeadlessLogger {};
    logger.set_up(&options)
}
