//! Drivetrain
//!
//! This example drives a small robot through one simulated match.
//!
//! Key concepts:
//! - A composite state: operating mode, drive mode and intake
//! - The operating mode follows a mode source; it is never transitioned by hand
//! - Guards gated on partial states
//! - Triggers that schedule work on a rising edge
//!
//! Run with: cargo run --example drivetrain

use foxflow::core::Dimension;
use foxflow::mode::{ManualModeSource, RobotMode};
use foxflow::{
    limits_transitions, partial, CommandScheduler, DeferredAction, EventLoop, Scheduler,
    StateMachine,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Drive {
    Stopped,
    FollowingPath,
    Manual,
}

limits_transitions! {
    Drive {
        Stopped => [FollowingPath, Manual],
        FollowingPath => [Stopped],
        Manual => [Stopped],
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Intake {
    Idle,
    Collecting,
    Holding,
}

fn main() -> Result<(), foxflow::Error> {
    let mode = ManualModeSource::new(RobotMode::Disabled);
    let event_loop = Arc::new(EventLoop::new());
    let scheduler = Arc::new(CommandScheduler::new().with_event_loop(Arc::clone(&event_loop)));

    let robot = StateMachine::builder()
        .name("drivetrain")
        .dimension(Dimension::robot_mode())
        .dimension(Dimension::limited("drive", Drive::Stopped))
        .dimension(Dimension::new("intake", Intake::Idle))
        .mode_source(mode.clone())
        .scheduler(scheduler.clone())
        .build()?;

    let beam_broken = Arc::new(AtomicBool::new(false));

    // Autonomous: follow the path while collecting.
    robot
        .specify(partial![RobotMode::Autonomous, Drive::Stopped])?
        .to(partial![Drive::FollowingPath, Intake::Collecting])?
        .always()
        .run(DeferredAction::run_once(|| println!("  -> starting path")));

    // Any mode change stops the drivetrain.
    for from in [RobotMode::Disabled, RobotMode::Teleop, RobotMode::Test] {
        robot
            .specify(partial![from, Drive::FollowingPath])?
            .to(partial![Drive::Stopped])?
            .always();
    }

    robot
        .specify(partial![RobotMode::Teleop, Drive::Stopped])?
        .to(partial![Drive::Manual])?
        .always();

    let sensor = Arc::clone(&beam_broken);
    robot
        .specify(partial![Intake::Collecting])?
        .to(partial![Intake::Holding])?
        .when(move || sensor.load(Ordering::SeqCst));

    robot
        .specify(partial![Intake::Holding])?
        .trigger_on(Arc::clone(&event_loop))
        .on_true(DeferredAction::run_once(|| println!("  -> game piece secured")));

    scheduler.schedule(robot.poll_action())?;

    let script = [
        (RobotMode::Disabled, false),
        (RobotMode::Autonomous, false),
        (RobotMode::Autonomous, false),
        (RobotMode::Autonomous, true),
        (RobotMode::Autonomous, true),
        (RobotMode::Teleop, true),
        (RobotMode::Teleop, true),
        (RobotMode::Teleop, true),
    ];

    for (tick, (reading, broken)) in script.into_iter().enumerate() {
        mode.set(reading);
        beam_broken.store(broken, Ordering::SeqCst);
        scheduler.run()?;

        let state = robot.current_state();
        println!(
            "tick {tick}: mode={:?} drive={:?} intake={:?}",
            state.get::<RobotMode>(),
            state.get::<Drive>(),
            state.get::<Intake>(),
        );
    }

    println!("\nTransitions:");
    for record in robot.history().records() {
        println!("  {:?}: {:?}", record.cause, record.to);
    }

    scheduler.cancel_all();
    Ok(())
}
