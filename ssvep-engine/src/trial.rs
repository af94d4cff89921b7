use crate::config::EngineConfig;
use rand::Rng;
use ssvep_core::{
    BackgroundImage, CompiledSeries, CuePolicy, Layout, PatchShape, Result, SsvepCommand,
    TrialPlan, compile_series, parse_layout,
};
use tracing::{info, warn};

/// Everything one accepted StartSSVEP needs; dropped when the run ends
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub plan: TrialPlan,
    pub layout: Layout,
    pub series: CompiledSeries,
    pub resolution: (u32, u32),
    pub shape: PatchShape,
    pub background: Option<BackgroundImage>,
}

impl RunConfig {
    pub fn build(cmd: SsvepCommand, config: &EngineConfig) -> Result<Self> {
        let plan = cmd.plan()?;
        let resolution = cmd.resolution()?;
        let shape = cmd.shape()?;
        let layout = parse_layout(cmd.layout_text()?)?;
        let series = compile_series(
            &layout,
            &cmd.resolved_series,
            plan.body_length,
            config.sampling_interval,
        )?;

        if let CuePolicy::FixedName(name) = &plan.cue_policy {
            if layout.index_of(name).is_none() {
                warn!(cue = %name, "cue names no patch in the layout, nothing will be highlighted");
            }
        }
        info!(
            patches = layout.len(),
            samples = series.sample_count(),
            max_correlation = series.correlation.max_off_diagonal().unwrap_or(0.0),
            "compiled time series"
        );

        Ok(Self {
            plan,
            layout,
            series,
            resolution,
            shape,
            background: cmd.background,
        })
    }
}

/// One cue per trial according to `policy`
pub fn select_cues<R: Rng>(
    policy: &CuePolicy,
    names: &[&str],
    repeats: usize,
    rng: &mut R,
) -> Vec<Option<String>> {
    match policy {
        CuePolicy::FixedName(name) => vec![Some(name.clone()); repeats],
        CuePolicy::NoCue => vec![None; repeats],
        CuePolicy::RandomPerTrial if names.is_empty() => vec![None; repeats],
        CuePolicy::RandomPerTrial => (0..repeats)
            .map(|_| Some(names[rng.random_range(0..names.len())].to_string()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use ssvep_core::{DisplayError, ExternalSeries, SeriesOrigin};

    fn command() -> SsvepCommand {
        SsvepCommand {
            resolution_x: Some(800),
            resolution_y: Some(600),
            repeats: Some(1),
            cue: Some("A".into()),
            patch_layout_text: Some("0,A,100,100,50,50,1.0,0.0;1,B,300,100,50,50,2.0,0.5".into()),
            head_length: Some(1.0),
            body_length: Some(2.0),
            tail_length: Some(1.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_synthesizes_missing_series() {
        let mut cmd = command();
        cmd.resolved_series = ExternalSeries::from_iter([("B".to_string(), vec![0.0, 1.0])]);
        let run = RunConfig::build(cmd, &EngineConfig::default()).unwrap();
        assert_eq!(run.series.sample_count(), 200);
        assert_eq!(run.series.get("A").unwrap().origin, SeriesOrigin::Synthesized);
        assert_eq!(run.series.get("B").unwrap().origin, SeriesOrigin::External);
        assert_eq!(run.shape, PatchShape::Rectangle);
        assert_eq!(run.resolution, (800, 600));
    }

    #[test]
    fn test_build_rejects_bad_layout() {
        let mut cmd = command();
        cmd.patch_layout_text = Some("0,A,100".into());
        let err = RunConfig::build(cmd, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, DisplayError::Format(_)));
    }

    #[test]
    fn test_build_rejects_unknown_shape() {
        let mut cmd = command();
        cmd.patch_shape = Some("hexagon".into());
        assert!(RunConfig::build(cmd, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_select_cues() {
        let mut rng = StdRng::seed_from_u64(7);
        let names = ["A", "B", "C"];
        let fixed = select_cues(&CuePolicy::FixedName("B".into()), &names, 3, &mut rng);
        assert_eq!(fixed, vec![Some("B".to_string()); 3]);
        assert_eq!(select_cues(&CuePolicy::NoCue, &names, 2, &mut rng), vec![None, None]);

        let random = select_cues(&CuePolicy::RandomPerTrial, &names, 50, &mut rng);
        assert_eq!(random.len(), 50);
        assert!(random.iter().all(|c| c.as_deref().is_some_and(|n| names.contains(&n))));
    }
}
