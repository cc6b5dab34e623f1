//! Example walking through the saturation engine end to end
//!
//! Run with: cargo run --package filament-core --example saturate_demo

use filament_core::domain::{gain_to_db, ProcessSpec, SaturationControls, SaturationEngine};

fn sine(frequency: f32, sample_rate: f32, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate).sin())
        .collect()
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("filament_core=debug,info")
        .init();

    println!("=== Filament Saturation Demo ===\n");

    const SAMPLE_RATE: f32 = 48000.0;
    const BLOCK: usize = 512;

    // 1. Build an engine with the default (tilt) tone design
    println!("1. Creating saturation engine...");
    let mut engine = SaturationEngine::new();
    let params = engine.params();
    println!(
        "   ✓ Defaults: drive {} dB, output {} dB, mix {}%, noise {}%",
        params.drive_db, params.output_db, params.mix_percent, params.noise_percent
    );

    // 2. Prepare for a processing context
    println!("\n2. Preparing for 48 kHz stereo, blocks of {BLOCK}...");
    engine.prepare(ProcessSpec::new(SAMPLE_RATE as f64, 2, BLOCK))?;
    println!("   ✓ Engine prepared");

    // 3. Drive sweep on a 440 Hz sine
    println!("\n3. Drive sweep on a 440 Hz sine:");
    for drive_db in [0.0, 10.0, 20.0, 30.0] {
        let mut engine = SaturationEngine::new();
        engine.set_drive_db(drive_db);
        engine.set_output_db(-6.0);
        engine.prepare(ProcessSpec::new(SAMPLE_RATE as f64, 2, BLOCK))?;

        let channel = sine(440.0, SAMPLE_RATE, BLOCK);
        let mut block = vec![channel.clone(), channel];
        engine.process(&mut block)?;

        println!(
            "   drive {:>4.0} dB -> peak {:>6.2} dBFS, rms {:>6.2} dBFS",
            drive_db,
            gain_to_db(peak(&block[0])),
            gain_to_db(rms(&block[0]))
        );
    }

    // 4. Noise floor under silence
    println!("\n4. Noise stage on silence (amount 30%):");
    engine.set_noise_percent(30.0);
    let mut silence = vec![vec![0.0_f32; BLOCK]; 2];
    engine.process(&mut silence)?;
    println!(
        "   ✓ Injected floor at {:.1} dBFS rms",
        gain_to_db(rms(&silence[0]))
    );
    engine.set_noise_percent(0.0);

    // 5. Dry/wet sweep
    println!("\n5. Dry/wet sweep:");
    for mix in [0.0, 50.0, 100.0] {
        engine.set_mix_percent(mix);
        let channel = sine(440.0, SAMPLE_RATE, BLOCK);
        let mut block = vec![channel.clone(), channel];
        engine.process(&mut block)?;
        println!(
            "   mix {:>3.0}% -> rms {:>6.2} dBFS",
            mix,
            gain_to_db(rms(&block[0]))
        );
    }

    // 6. Publishing parameters through the lock-free control bank
    println!("\n6. Lock-free parameter control:");
    let controls = SaturationControls::new(engine.params());
    controls.set_drive_db(18.0);
    controls.set_mix_percent(75.0);
    engine.apply_controls(&controls);
    let params = engine.params();
    println!(
        "   ✓ Applied snapshot: drive {} dB, mix {}%",
        params.drive_db, params.mix_percent
    );

    println!("\n=== Demo Complete ===");
    Ok(())
}
