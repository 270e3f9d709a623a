type Release = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Release steps run in reverse registration order on shutdown.
///
/// A failing step is logged and the remaining steps still run.
#[derive(Default)]
pub struct ReleaseList {
    steps: Vec<(String, Release)>,
}

impl ReleaseList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, name: impl Into<String>, release: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.steps.push((name.into(), Box::new(release)));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step, newest first. Returns the number of failed steps.
    pub fn run(self) -> usize {
        let mut failed = 0;
        for (name, release) in self.steps.into_iter().rev() {
            tracing::info!("Releasing {name}");
            if let Err(e) = release() {
                tracing::error!("Failed to release {name}: {e:#}");
                failed += 1;
            }
        }
        failed
    }
}
