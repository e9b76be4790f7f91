#![cfg(feature = "emulator")]

use std::sync::Arc;

use anyhow::Result;
use sidemu::sid::model::{MIXER_TABLES, RESONANCE_TABLES, SUMMER_TABLES, TABLE_SIZE, VOLUME_TABLES};
use sidemu::sid::Filter;
use sidemu::{AnalogPipeline, ChipRevision, FilterModel, SidError, SidPipeline};

#[test]
fn shared_models_are_memoized() -> Result<()> {
    for revision in ChipRevision::ALL {
        let a = FilterModel::shared(revision)?;
        let b = FilterModel::shared(revision)?;
        assert!(Arc::ptr_eq(&a, &b));
    }
    let a = FilterModel::shared(ChipRevision::Mos6581)?;
    let b = FilterModel::shared(ChipRevision::Mos8580)?;
    assert!(!Arc::ptr_eq(&a, &b));
    Ok(())
}

#[test]
fn table_families_have_expected_shapes() -> Result<()> {
    for revision in ChipRevision::ALL {
        let model = FilterModel::shared(revision)?;
        for i in 0..SUMMER_TABLES {
            assert_eq!(model.summer(i).len(), (2 + i) << 16);
        }
        assert_eq!(model.mixer(0).len(), 1);
        for i in 1..MIXER_TABLES {
            assert_eq!(model.mixer(i).len(), i << 16);
        }
        for v in 0..VOLUME_TABLES {
            assert_eq!(model.volume(v).len(), TABLE_SIZE);
        }
        for r in 0..RESONANCE_TABLES {
            assert_eq!(model.resonance(r).len(), TABLE_SIZE);
        }
    }
    Ok(())
}

#[test]
fn rebuilding_yields_identical_tables() -> Result<()> {
    let revision = ChipRevision::Mos8580;
    let shared = FilterModel::shared(revision)?;
    let fresh = FilterModel::build(&revision.params())?;

    for i in 0..SUMMER_TABLES {
        assert!(shared.summer(i) == fresh.summer(i), "summer {i}");
    }
    for i in 0..MIXER_TABLES {
        assert!(shared.mixer(i) == fresh.mixer(i), "mixer {i}");
    }
    for v in 0..VOLUME_TABLES {
        assert!(shared.volume(v) == fresh.volume(v), "volume {v}");
    }
    for r in 0..RESONANCE_TABLES {
        assert!(shared.resonance(r) == fresh.resonance(r), "resonance {r}");
    }
    assert!((0..TABLE_SIZE).all(|i| shared.opamp_rev(i) == fresh.opamp_rev(i)));
    Ok(())
}

#[test]
fn degenerate_parameters_fail_before_building() {
    let mut params = ChipRevision::Mos6581.params();
    params.opamp_curve.truncate(2);
    assert!(matches!(
        FilterModel::build(&params),
        Err(SidError::InvalidParameters(_))
    ));

    // Operating range collapses: vmin above vmax
    let mut params = ChipRevision::Mos6581.params();
    for point in &mut params.opamp_curve {
        point.0 += 20.0;
    }
    assert!(matches!(
        FilterModel::build(&params),
        Err(SidError::InvalidParameters(_))
    ));

    let mut params = ChipRevision::Mos8580.params();
    params.capacitance = 0.0;
    assert!(matches!(
        FilterModel::build(&params),
        Err(SidError::InvalidParameters(_))
    ));
}

fn settle(pipeline: &mut AnalogPipeline, voices: [f32; 3]) -> u16 {
    pipeline.set_voice_levels(voices);
    pipeline.clock(16);
    pipeline.output_code()
}

#[test]
fn master_volume_scales_direct_voices() -> Result<()> {
    for revision in ChipRevision::ALL {
        let mut pipeline = AnalogPipeline::new(revision)?;

        pipeline.write(0x18, 0x0f);
        let high = settle(&mut pipeline, [0.5, 0.0, 0.0]);
        let low = settle(&mut pipeline, [-0.5, 0.0, 0.0]);
        assert!(high.abs_diff(low) > 64, "{revision:?}: {high} vs {low}");

        pipeline.write(0x18, 0x00);
        let high = settle(&mut pipeline, [0.5, 0.0, 0.0]);
        let low = settle(&mut pipeline, [-0.5, 0.0, 0.0]);
        assert!(high.abs_diff(low) <= 1, "{revision:?}: {high} vs {low}");
    }
    Ok(())
}

#[test]
fn filtered_voice_leaves_direct_path() -> Result<()> {
    for revision in ChipRevision::ALL {
        let run = |level: f32| -> Result<u16> {
            let mut pipeline = AnalogPipeline::new(revision)?;
            pipeline.write(0x18, 0x0f); // no filter outputs selected
            pipeline.write(0x17, 0x01);
            Ok(settle(&mut pipeline, [level, 0.25, 0.0]))
        };
        assert_eq!(run(0.9)?, run(-0.9)?);
        assert_eq!(
            AnalogPipeline::new(revision)?.filter().input_counts(),
            (0, 4)
        );
    }
    Ok(())
}

#[test]
fn routing_and_mode_set_input_counts() -> Result<()> {
    let mut pipeline = AnalogPipeline::new(ChipRevision::Mos6581)?;
    pipeline.write(0x17, 0xf3);
    pipeline.write(0x18, 0x3f); // LP + BP
    assert_eq!(pipeline.filter().res(), 0x0f);
    assert_eq!(pipeline.filter().input_counts(), (2, 4));

    // Voice 3 off only removes it from the direct path
    pipeline.write(0x18, 0x8f);
    assert_eq!(pipeline.filter().input_counts(), (2, 1));

    pipeline.enable_filter(false);
    assert!(pipeline.filter().routing().is_empty());
    assert_eq!(pipeline.filter().input_counts(), (0, 3));
    Ok(())
}

#[test]
fn cutoff_registers_combine_into_eleven_bits() -> Result<()> {
    let mut pipeline = AnalogPipeline::new(ChipRevision::Mos8580)?;
    pipeline.write(0x15, 0xff);
    pipeline.write(0x16, 0xab);
    assert_eq!(pipeline.filter().fc(), (0xab << 3) | 0x07);
    pipeline.write(0x15, 0x00);
    assert_eq!(pipeline.filter().fc(), 0xab << 3);
    Ok(())
}

#[test]
fn filter_reset_reproduces_output() -> Result<()> {
    for revision in ChipRevision::ALL {
        let mut filter = Filter::new(FilterModel::shared(revision)?);
        let run = |filter: &mut Filter| -> Vec<u16> {
            filter.write_fc_lo(0x03);
            filter.write_fc_hi(0x40);
            filter.write_res_filt(0x87);
            filter.write_mode_vol(0x1f);
            (0..256)
                .map(|i| {
                    let level = if i % 32 < 16 { 0.7 } else { -0.7 };
                    filter.clock(level, 0.0, -level)
                })
                .collect()
        };

        let first = run(&mut filter);
        filter.reset();
        let second = run(&mut filter);
        assert_eq!(first, second, "{revision:?}");
        assert!(first.windows(2).any(|w| w[0] != w[1]));
    }
    Ok(())
}

/// Low-pass output range of a square wave on voice 1, after settling
fn lowpass_swing(revision: ChipRevision, fc_hi: u8) -> Result<(u16, u16)> {
    let mut filter = Filter::new(FilterModel::shared(revision)?);
    filter.write_fc_hi(fc_hi);
    filter.write_res_filt(0x01);
    filter.write_mode_vol(0x1f);

    let mut range = (u16::MAX, u16::MIN);
    for cycle in 0..40_000u32 {
        let level = if cycle % 2000 < 1000 { 0.8 } else { -0.8 };
        let out = filter.clock(level, 0.0, 0.0);
        if cycle >= 20_000 {
            range = (range.0.min(out), range.1.max(out));
        }
    }
    Ok(range)
}

#[test]
fn lowpass_follows_input_and_cutoff() -> Result<()> {
    for revision in ChipRevision::ALL {
        let low = lowpass_swing(revision, 0x10)?;
        let high = lowpass_swing(revision, 0xff)?;
        assert!(low.1 - low.0 > 512, "{revision:?} fc 0x10: {low:?}");
        assert!(high.1 - high.0 > 512, "{revision:?} fc 0xff: {high:?}");
        assert_ne!(low, high, "{revision:?}");
    }
    Ok(())
}

#[test]
fn pipeline_reads_and_reset() -> Result<()> {
    let mut pipeline = AnalogPipeline::new(ChipRevision::Mos6581)?;
    pipeline.write(0x18, 0x1f);
    assert_eq!(pipeline.read(0x18), 0x1f);
    assert_eq!(pipeline.read(0x19), 0xff);
    assert_eq!(pipeline.read(0x1b), 0x00);

    pipeline.clock(100);
    assert_eq!(pipeline.cycles(), 100);
    pipeline.reset();
    assert_eq!(pipeline.cycles(), 0);
    assert_eq!(pipeline.read(0x18), 0x00);
    assert_eq!(pipeline.filter().volume(), 0);
    Ok(())
}
