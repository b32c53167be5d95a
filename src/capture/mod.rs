//! Off-screen snapshots of live DOM subtrees.
//!
//! A [`Snapshotter`] clones an element into a detached-looking container below
//! the document, pins the clone's computed styles inline (see [`freeze`]),
//! waits for charts and fonts to settle, then screenshots the container's
//! bounding box through the [`Engine`].

pub mod freeze;
pub mod scripts;

use crate::config::CaptureConfig;
use crate::rendering::Raster;
use crate::{Engine, Error, Region, Result};
use freeze::{freeze_plan, NodeStyle, StylePatch, STYLE_ALLOW_LIST};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Envelope every in-page script replies with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptReply<T> {
    Failed { error: String },
    Done(T),
}

/// Render `template` with `args`, evaluate it and decode its JSON reply.
pub(crate) fn run_script<E, A, T>(
    engine: &mut E,
    template: &str,
    args: &A,
    await_promise: bool,
) -> Result<T>
where
    E: Engine,
    A: Serialize,
    T: DeserializeOwned,
{
    let script = scripts::render(template, args)?;
    let result = engine.evaluate(&script, await_promise)?;
    if result.is_error {
        return Err(Error::ScriptError(result.value));
    }
    match serde_json::from_str::<ScriptReply<T>>(&result.value)? {
        ScriptReply::Done(value) => Ok(value),
        ScriptReply::Failed { error } => Err(Error::ScriptError(error)),
    }
}

/// What to snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureTarget {
    /// Selector of the live element to clone
    pub selector: String,
    /// Pin the clone to this CSS pixel height instead of letting it grow
    pub fixed_height: Option<u32>,
}

impl CaptureTarget {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            fixed_height: None,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.fixed_height = Some(height);
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MountArgs<'a> {
    selector: &'a str,
    container_id: &'a str,
    width: u32,
    height: Option<u32>,
    padding_top: u32,
    padding_bottom: u32,
    props: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MountReport {
    #[serde(default)]
    nodes: Vec<NodeStyle>,
    #[serde(default)]
    svg_count: usize,
    #[serde(default)]
    canvas_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyArgs<'a> {
    container_id: &'a str,
    patches: &'a [StylePatch],
}

#[derive(Debug, Default, Deserialize)]
struct ApplyReport {
    #[serde(default)]
    applied: usize,
    #[serde(default)]
    failed: usize,
}

#[derive(Debug, Default, Deserialize)]
struct CanvasReport {
    #[serde(default)]
    copied: usize,
    #[serde(default)]
    failed: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerArgs<'a> {
    container_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanvasArgs<'a> {
    selector: &'a str,
    container_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkupArgs<'a> {
    container_id: &'a str,
    html: &'a str,
    width: u32,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Bounds {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Takes snapshots through a borrowed engine.
pub struct Snapshotter<'a, E: Engine> {
    engine: &'a mut E,
    config: &'a CaptureConfig,
    next_id: usize,
}

impl<'a, E: Engine> Snapshotter<'a, E> {
    pub fn new(engine: &'a mut E, config: &'a CaptureConfig) -> Self {
        Self {
            engine,
            config,
            next_id: 0,
        }
    }

    /// Clone, freeze and rasterize the element named by `target`.
    ///
    /// The temporary container is removed whether or not the capture succeeds.
    pub fn capture(&mut self, target: &CaptureTarget) -> Result<Raster> {
        let id = self.next_container_id();
        let result = self.capture_clone(&id, target);
        self.unmount(&id);
        result
    }

    /// Rasterize static markup, such as a generated cover page.
    pub fn capture_markup(&mut self, html: &str, height: Option<u32>) -> Result<Raster> {
        let id = self.next_container_id();
        let result = self.capture_injected(&id, html, height);
        self.unmount(&id);
        result
    }

    fn next_container_id(&mut self) -> String {
        self.next_id += 1;
        format!("riskos-snapshot-{}", self.next_id)
    }

    fn capture_clone(&mut self, id: &str, target: &CaptureTarget) -> Result<Raster> {
        let cfg = self.config;
        let mount: MountReport = run_script(
            self.engine,
            scripts::MOUNT,
            &MountArgs {
                selector: &target.selector,
                container_id: id,
                width: cfg.width,
                height: target.fixed_height,
                padding_top: cfg.padding_top,
                padding_bottom: cfg.padding_bottom,
                props: STYLE_ALLOW_LIST,
            },
            false,
        )
        .map_err(|e| Error::Capture(format!("could not mount {}: {}", target.selector, e)))?;

        let plan = freeze_plan(&mount.nodes);
        match run_script::<_, _, ApplyReport>(
            self.engine,
            scripts::APPLY,
            &ApplyArgs {
                container_id: id,
                patches: &plan,
            },
            false,
        ) {
            Ok(report) => debug!(
                "froze {} nodes of {} ({} failed)",
                report.applied, target.selector, report.failed
            ),
            Err(e) => warn!("style freeze failed for {}: {}", target.selector, e),
        }

        self.engine.pause(cfg.settle());

        if mount.svg_count > 0 || mount.canvas_count > 0 {
            if let Err(e) = run_script::<_, _, serde_json::Value>(
                self.engine,
                scripts::SIZE_SVGS,
                &ContainerArgs { container_id: id },
                false,
            ) {
                debug!("svg sizing skipped: {}", e);
            }
            self.engine.pause(cfg.chart_settle());
        }

        self.wait_for_fonts();

        if mount.canvas_count > 0 {
            match run_script::<_, _, CanvasReport>(
                self.engine,
                scripts::COPY_CANVASES,
                &CanvasArgs {
                    selector: &target.selector,
                    container_id: id,
                },
                true,
            ) {
                Ok(report) => debug!(
                    "copied {} canvases ({} failed)",
                    report.copied, report.failed
                ),
                Err(e) => warn!("canvas copy failed for {}: {}", target.selector, e),
            }
        }

        self.rasterize(id)
    }

    fn capture_injected(&mut self, id: &str, html: &str, height: Option<u32>) -> Result<Raster> {
        run_script::<_, _, serde_json::Value>(
            self.engine,
            scripts::INJECT_MARKUP,
            &MarkupArgs {
                container_id: id,
                html,
                width: self.config.width,
                height,
            },
            false,
        )
        .map_err(|e| Error::Capture(format!("could not mount markup: {}", e)))?;

        self.engine.pause(self.config.cover_settle());
        self.wait_for_fonts();
        self.rasterize(id)
    }

    fn wait_for_fonts(&mut self) {
        if let Err(e) =
            run_script::<_, _, serde_json::Value>(self.engine, scripts::FONTS_READY, &(), true)
        {
            debug!("font readiness unknown: {}", e);
        }
    }

    fn rasterize(&mut self, id: &str) -> Result<Raster> {
        let bounds: Bounds = run_script(
            self.engine,
            scripts::MEASURE,
            &ContainerArgs { container_id: id },
            false,
        )
        .map_err(|e| Error::Capture(format!("could not measure snapshot: {}", e)))?;

        if !(bounds.width > 0.0 && bounds.height > 0.0) {
            return Err(Error::Capture(format!(
                "snapshot has no area ({}x{})",
                bounds.width, bounds.height
            )));
        }

        let clip = Region {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        };
        let png = self
            .engine
            .capture_region(clip, self.config.device_scale)
            .map_err(|e| Error::Capture(format!("screenshot failed: {}", e)))?;
        Raster::from_png(png)
    }

    fn unmount(&mut self, id: &str) {
        if let Err(e) = run_script::<_, _, serde_json::Value>(
            self.engine,
            scripts::REMOVE,
            &ContainerArgs { container_id: id },
            false,
        ) {
            warn!("failed to remove snapshot container {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::raster::solid_png;
    use crate::{EngineConfig, ScriptResult};
    use std::time::Duration;

    /// Answers each script by the first template line that identifies it.
    #[derive(Default)]
    struct ScriptedEngine {
        scripts: Vec<String>,
        fail_measure: bool,
        height: f64,
        paused: Duration,
    }

    impl Engine for ScriptedEngine {
        fn new(_config: EngineConfig) -> Result<Self> {
            Ok(Self::default())
        }

        fn load_url(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        fn evaluate(&mut self, script: &str, _await_promise: bool) -> Result<ScriptResult> {
            self.scripts.push(script.to_string());
            let value = if script.contains("source.cloneNode(true)") {
                r#"{"nodes":[{"tag":"div","props":{"color":"oklch(1 0 0)"}}],"svgCount":1,"canvasCount":0}"#.to_string()
            } else if script.contains("window.scrollY") {
                if self.fail_measure {
                    r#"{"error":"snapshot container missing"}"#.to_string()
                } else {
                    format!(r#"{{"x":0,"y":900,"width":816,"height":{}}}"#, self.height)
                }
            } else {
                r#"{"ok":true}"#.to_string()
            };
            Ok(ScriptResult {
                value,
                is_error: false,
            })
        }

        fn capture_region(&mut self, clip: Region, scale: f64) -> Result<Vec<u8>> {
            Ok(solid_png(
                (clip.width * scale) as u32,
                (clip.height * scale) as u32,
                [255, 255, 255, 255],
            ))
        }

        fn pause(&mut self, duration: Duration) {
            self.paused += duration;
        }

        fn close(self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn capture_rasterizes_at_device_scale_and_unmounts() {
        let mut engine = ScriptedEngine {
            height: 300.0,
            ..Default::default()
        };
        let config = CaptureConfig::default();
        let raster = Snapshotter::new(&mut engine, &config)
            .capture(&CaptureTarget::new("[data-export-section=\"0\"]"))
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (1632, 600));
        // settle plus chart settle, since the clone holds an svg
        assert_eq!(engine.paused, Duration::from_millis(1800));
        assert!(engine.scripts.last().unwrap().contains("removeChild"));
        let apply = engine
            .scripts
            .iter()
            .find(|s| s.contains("args.patches"))
            .unwrap();
        assert!(apply.contains("rgb(255, 255, 255)"));
    }

    #[test]
    fn failed_measure_still_unmounts() {
        let mut engine = ScriptedEngine {
            fail_measure: true,
            ..Default::default()
        };
        let config = CaptureConfig::default();
        let err = Snapshotter::new(&mut engine, &config)
            .capture(&CaptureTarget::new("#chart"))
            .unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
        assert!(engine.scripts.last().unwrap().contains("removeChild"));
    }

    #[test]
    fn zero_height_is_a_hard_error() {
        let mut engine = ScriptedEngine::default();
        let config = CaptureConfig::default();
        let err = Snapshotter::new(&mut engine, &config)
            .capture(&CaptureTarget::new("#empty"))
            .unwrap_err();
        assert!(err.to_string().contains("no area"));
    }

    #[test]
    fn container_ids_are_unique_per_capture() {
        let mut engine = ScriptedEngine {
            height: 10.0,
            ..Default::default()
        };
        let config = CaptureConfig::default();
        let mut snap = Snapshotter::new(&mut engine, &config);
        snap.capture_markup("<p>cover</p>", Some(1056)).unwrap();
        snap.capture_markup("<p>cover</p>", None).unwrap();
        drop(snap);
        let removals: Vec<&String> = engine
            .scripts
            .iter()
            .filter(|s| s.contains("removeChild"))
            .collect();
        assert!(removals[0].contains("riskos-snapshot-1"));
        assert!(removals[1].contains("riskos-snapshot-2"));
    }
}
