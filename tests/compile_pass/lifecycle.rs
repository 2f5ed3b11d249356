// ABOUTME: Compile-pass test walking a container through its whole lifecycle.
// ABOUTME: Each step is only callable in the state the previous step returns.

use dockproc::container::{Container, CreateConfig, Unattached};
use dockproc::runtime::ImageRemoval;
use dockproc::Execution;
use std::path::Path;

async fn lifecycle(container: Container<Unattached>) -> dockproc::Result<()> {
    let created = container.create(CreateConfig::named("build")).await?;
    created.upload(Path::new("setup.sh"), "/").await?;
    let started = created.start().await?;
    let _output = started.exec(&Execution::inline("true")).await?;
    let removed = started.remove(true).await?;
    removed.remove_image(ImageRemoval::default()).await
}

fn main() {
    let _ = lifecycle;
}
