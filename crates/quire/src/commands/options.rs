//! Options command.

use anyhow::Result;
use quire_build::targets::select;
use quire_build::{BuildDriver, ComposedOptions, Settings, Target};

/// Print the options `target` would be rendered with, as YAML.
///
/// Repo-metadata options appear under `metadata`, where the engine reads
/// them from the metadata file.
pub async fn run(settings: Settings, target: String) -> Result<()> {
    let (target, options) = tokio::task::spawn_blocking(move || -> Result<_> {
        let driver = BuildDriver::from_settings(settings);
        let target = select(&driver.targets()?, &[target])?.remove(0);
        let layers = driver.load_layers()?;
        let options = driver.compose_for(&target, &layers)?;
        Ok((target, options))
    })
    .await??;

    print!("{}", render(&target, &options)?);
    Ok(())
}

fn render(target: &Target, options: &ComposedOptions) -> Result<String> {
    let mut out = format!(
        "# {} ({}) -> {}\n",
        target.name(),
        target.kind,
        target.output.display()
    );
    for layer in &options.layers {
        out.push_str(&format!("# {}: {}\n", layer.origin, layer.path.display()));
    }
    out.push_str(&serde_yaml::to_string(&options.merged)?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quire_build::{compose, ConfigLayer, LayerOrigin, LayerSet, TargetKind};
    use serde_yaml::Mapping;
    use std::path::PathBuf;

    #[test]
    fn renders_header_and_merged_options() {
        let mut engine = Mapping::new();
        engine.insert("standalone".into(), true.into());
        let layers = LayerSet::from_layers(vec![ConfigLayer {
            origin: LayerOrigin::EngineDefaults,
            path: PathBuf::from("data/engine-defaults.yaml"),
            present: true,
            options: engine,
        }]);
        let target = Target {
            source: PathBuf::from("slides-intro.md"),
            output: PathBuf::from("generated/slides-intro.pdf"),
            kind: TargetKind::Slides,
        };

        let text = render(&target, &compose(&layers, TargetKind::Slides, None)).unwrap();

        assert_eq!(
            text,
            format!(
                "# slides-intro (slides) -> generated/slides-intro.pdf\n\
                 # {}: data/engine-defaults.yaml\n\
                 standalone: true\n\
                 to: beamer\n",
                LayerOrigin::EngineDefaults
            )
        );
    }

    #[test]
    fn metadata_layer_is_printed_under_metadata() {
        let mut engine = Mapping::new();
        let mut engine_meta = Mapping::new();
        engine_meta.insert("lang".into(), "en".into());
        engine.insert("metadata".into(), engine_meta.into());
        let mut repo_meta = Mapping::new();
        repo_meta.insert("lang".into(), "en-US".into());

        let layers = LayerSet::from_layers(vec![
            ConfigLayer {
                origin: LayerOrigin::EngineDefaults,
                path: PathBuf::from("data/engine-defaults.yaml"),
                present: true,
                options: engine,
            },
            ConfigLayer {
                origin: LayerOrigin::RepoMetadata,
                path: PathBuf::from("metadata.yaml"),
                present: true,
                options: repo_meta,
            },
        ]);
        let target = Target {
            source: PathBuf::from("P1234.md"),
            output: PathBuf::from("generated/P1234.html"),
            kind: TargetKind::Paper,
        };

        let text = render(&target, &compose(&layers, TargetKind::Paper, None)).unwrap();

        assert!(text.ends_with("metadata:\n  lang: en-US\n"), "{}", text);
    }
}
