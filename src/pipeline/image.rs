//! Image composer: merges the build artifacts into one flashable image

use std::path::{Path, PathBuf};

use crate::common::config::ToolSpec;
use crate::common::{Error, Result};

use super::build::BuildTarget;
use super::layout::FlashImageLayout;
use super::tool::{self, Vars};

/// Argument that expands into the layout's `<offset> <file>` pairs
const SEGMENTS_PLACEHOLDER: &str = "{segments}";

/// Merge `target`'s artifacts into `image` according to `layout`
pub async fn compose(
    spec: &ToolSpec,
    layout: &FlashImageLayout,
    target: &BuildTarget,
    image: &Path,
) -> Result<PathBuf> {
    layout.check_fits(&target.build_dir)?;

    let args = merge_args(spec, layout, target, image);

    tracing::info!(
        image = %image.display(),
        flash_mb = layout.flash_size_mb(),
        "Composing flash image"
    );

    let status = tool::run("merge", spec, &args, false).await?;
    if !status.success() {
        return Err(Error::merge_failed(status));
    }

    Ok(image.to_path_buf())
}

fn merge_args(
    spec: &ToolSpec,
    layout: &FlashImageLayout,
    target: &BuildTarget,
    image: &Path,
) -> Vec<String> {
    let vars = Vars::new()
        .with("env", target.env.as_str())
        .with("case", target.case.name.as_str())
        .with("build_dir", target.build_dir.display().to_string())
        .with("image", image.display().to_string())
        .with("flash_size_mb", layout.flash_size_mb().to_string());

    let mut args = Vec::with_capacity(spec.args.len() + layout.segments.len() * 2);
    for arg in &spec.args {
        if arg == SEGMENTS_PLACEHOLDER {
            args.extend(layout.segment_args(&target.build_dir));
        } else {
            args.push(vars.render(arg));
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TestCase;
    use crate::common::config::Tools;

    fn target() -> BuildTarget {
        BuildTarget {
            env: "esp32dev".to_string(),
            case: TestCase::new("test_print", false),
            build_dir: PathBuf::from(".pio/build/esp32dev"),
        }
    }

    #[test]
    fn test_default_merge_command_line() {
        let spec = Tools::default().merge;
        let args = merge_args(
            &spec,
            &FlashImageLayout::default(),
            &target(),
            Path::new("result.bin"),
        );

        let joined = args.join(" ");
        assert!(joined.starts_with("--chip esp32 merge_bin --output result.bin --fill-flash-size 8MB"));
        assert!(joined.contains("0x1000 .pio/build/esp32dev/bootloader.bin"));
        assert!(joined.contains("0x8000 .pio/build/esp32dev/partitions.bin"));
        assert!(joined.contains("0x10000 .pio/build/esp32dev/firmware.bin"));
        assert!(joined.ends_with("--flash_mode dio --flash_freq 40m"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_merge_failure_is_an_error() {
        let spec = ToolSpec {
            program: "false".to_string(),
            args: Vec::new(),
        };
        let result = compose(
            &spec,
            &FlashImageLayout::default(),
            &target(),
            Path::new("result.bin"),
        )
        .await;
        assert!(matches!(result, Err(Error::MergeFailed { .. })));
    }
}
