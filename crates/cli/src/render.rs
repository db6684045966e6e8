//! Terminal rendering of session and controller events.

use tokio::sync::broadcast::error::RecvError;

use vui_controller::{ControllerEvent, ConversationController};
use vui_core::DisplayEvent;
use vui_session::TransportSession;

/// Spawn the render task. It drains every consumer stream and prints a
/// line-oriented view of the conversation.
pub fn spawn(session: &TransportSession, controller: &ConversationController) {
    let mut displays = session.subscribe_display();
    let mut results = session.subscribe_result();
    let mut analysis = session.subscribe_analysis();
    let mut events = controller.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = displays.recv() => match event {
                    Ok(Some(display)) => print_display(&display),
                    Ok(None) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "display stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                event = results.recv() => match event {
                    Ok(Some(table)) => print_result(&table),
                    Ok(None) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "result stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                event = analysis.recv() => match event {
                    Ok(Some(situation)) => {
                        println!(
                            "[analysis] cube: {}",
                            situation.cube_label().unwrap_or("(unnamed)")
                        );
                    }
                    Ok(None) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "analysis stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                event = events.recv() => match event {
                    Ok(event) => print_controller_event(&event),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "controller stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
}

fn print_display(display: &DisplayEvent) {
    match display {
        DisplayEvent::List(list) => {
            println!("{}", list.display_message);
            for item in &list.data {
                match &item.details {
                    Some(details) => println!("  - {} ({})", item.title, details),
                    None => println!("  - {}", item.title),
                }
            }
        }
        DisplayEvent::TwoList(two) => {
            println!("{}", two.display_message);
            for item in &two.data_left {
                println!("  < {}", item.title);
            }
            for item in &two.data_right {
                println!("  > {}", item.title);
            }
        }
        DisplayEvent::Message(message) => println!("{}", message.display_message),
        DisplayEvent::Error(error) => eprintln!("error: {}", error.display_message),
        DisplayEvent::Exit(exit) => {
            if let Some(message) = &exit.display_message {
                println!("{}", message);
            }
            println!("(dialogue finished)");
        }
    }
}

fn print_result(table: &str) {
    println!("--- result ---");
    for line in table.lines() {
        println!("{}", line);
    }
    println!("--------------");
}

fn print_controller_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::InputRejected => eprintln!("Input must not be empty."),
        ControllerEvent::ListeningChanged(true) => println!("[listening]"),
        ControllerEvent::ListeningChanged(false) => println!("[not listening]"),
        ControllerEvent::ReviseAvailable(true) => {
            println!("(a result is available, :revise to refine the query)");
        }
        ControllerEvent::FocusInput
        | ControllerEvent::SpeakingChanged(_)
        | ControllerEvent::ReviseAvailable(false) => {}
    }
}
