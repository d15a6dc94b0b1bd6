//! End-to-end tests: commands in, scheduler passes, console text out.

use byteos_kernel::bytecode::op;
use byteos_kernel::{parse_line, Pid, System};
use byteos_storage::{Fat, RamDevice};

type TestSystem = System<RamDevice<4096>, String>;

fn system() -> TestSystem {
    System::new(Fat::mount(RamDevice::new()), String::new())
}

fn install(sys: &mut TestSystem, name: &str, program: &[u8]) {
    sys.fat_mut()
        .store(name, program.len() as u16, program)
        .unwrap();
}

fn run_line(sys: &mut TestSystem, line: &str) {
    let (command, args) = parse_line(line).unwrap().unwrap();
    sys.dispatch(command, &args);
}

fn drain(sys: &mut TestSystem) -> String {
    std::mem::take(sys.console_mut())
}

#[test]
fn stop_only_program_terminates_after_one_pass() {
    let mut sys = system();
    install(&mut sys, "halt", &[op::STOP]);
    sys.run_program("halt").unwrap();
    assert_eq!(sys.procs().live_count(), 1);

    sys.tick();
    assert_eq!(sys.procs().live_count(), 0);

    // The slot itself is reclaimed on the next pass.
    sys.tick();
    assert!(sys.procs().pid_at(0).is_none());
}

#[test]
fn scheduler_interleaves_processes_one_opcode_at_a_time() {
    let mut sys = system();
    install(
        &mut sys,
        "a",
        &[op::CHAR, b'a', op::PRINT, op::CHAR, b'a', op::PRINT, op::STOP],
    );
    install(
        &mut sys,
        "b",
        &[op::CHAR, b'b', op::PRINT, op::CHAR, b'b', op::PRINT, op::STOP],
    );
    sys.run_program("a").unwrap();
    sys.run_program("b").unwrap();

    for _ in 0..5 {
        sys.tick();
    }
    assert_eq!(drain(&mut sys), "abab");
    assert_eq!(sys.procs().live_count(), 0);
}

#[test]
fn paused_process_consumes_no_cycles() {
    let spin_a = [op::LOOP, op::CHAR, b'a', op::PRINT, op::ENDLOOP];
    let spin_b = [op::LOOP, op::CHAR, b'b', op::PRINT, op::ENDLOOP];
    let mut sys = system();
    install(&mut sys, "a", &spin_a);
    install(&mut sys, "b", &spin_b);
    sys.run_program("a").unwrap();
    sys.run_program("b").unwrap();

    run_line(&mut sys, "suspend 2");
    drain(&mut sys);
    for _ in 0..6 {
        sys.tick();
    }
    let out = drain(&mut sys);
    assert_eq!(out, "aa");

    run_line(&mut sys, "resume 2");
    drain(&mut sys);
    for _ in 0..8 {
        sys.tick();
    }
    assert!(drain(&mut sys).contains('b'));
}

#[test]
fn kill_releases_the_process_and_its_variables() {
    let mut sys = system();
    install(
        &mut sys,
        "spin",
        &[op::INT, 0, 5, op::SET, b'x', op::LOOP, op::ENDLOOP],
    );
    let pid = sys.run_program("spin").unwrap();
    for _ in 0..3 {
        sys.tick();
    }
    assert_eq!(sys.vars().count_for(pid), 1);

    run_line(&mut sys, "kill 1");
    assert!(drain(&mut sys).contains("Killed process 1."));
    assert_eq!(sys.vars().count_for(pid), 0);
    assert_eq!(sys.procs().live_count(), 0);
}

#[test]
fn process_commands_reject_bad_ids() {
    let mut sys = system();
    run_line(&mut sys, "suspend 99");
    assert_eq!(drain(&mut sys), "Error: process not found\n");

    run_line(&mut sys, "resume 0");
    assert_eq!(
        drain(&mut sys),
        "Error: process id must be a positive integer\n"
    );
}

#[test]
fn store_retrieve_erase_round_trip() {
    let mut sys = system();
    run_line(&mut sys, "store greet 5 hello");
    assert_eq!(drain(&mut sys), "Stored \"greet\" (5 bytes).\n");

    run_line(&mut sys, "retrieve greet");
    assert_eq!(drain(&mut sys), "hello\n");

    run_line(&mut sys, "files");
    let listing = drain(&mut sys);
    assert!(listing.contains("1 of 10 file slots in use:"));
    assert!(listing.contains("greet  5 bytes"));

    run_line(&mut sys, "erase greet");
    drain(&mut sys);
    run_line(&mut sys, "retrieve greet");
    assert_eq!(drain(&mut sys), "Error: file not found\n");
}

#[test]
fn file_table_fills_at_ten_entries() {
    let mut sys = system();
    for i in 0..10 {
        run_line(&mut sys, &format!("store f{} 4 data", i));
    }
    drain(&mut sys);
    run_line(&mut sys, "store extra 4 data");
    assert_eq!(drain(&mut sys), "Error: file table is full\n");
}

#[test]
fn freespace_reflects_stored_files() {
    let mut sys = system();
    run_line(&mut sys, "store a 100 x");
    drain(&mut sys);
    run_line(&mut sys, "freespace");
    // 4096-byte store minus the 161-byte table region minus the file.
    assert_eq!(
        drain(&mut sys),
        "Largest free block: 3835 bytes (3835 bytes free in total).\n"
    );
}

#[test]
fn fork_runs_the_child_and_wait_blocks_until_it_is_gone() {
    let mut sys = system();
    install(&mut sys, "child", &[op::CHAR, b'c', op::PRINT, op::STOP]);
    let parent = [
        op::STRING,
        b'c',
        b'h',
        b'i',
        b'l',
        b'd',
        0,
        op::FORK,
        op::WAITUNTILDONE,
        op::CHAR,
        b'p',
        op::PRINT,
        op::STOP,
    ];
    install(&mut sys, "parent", &parent);
    sys.run_program("parent").unwrap();

    for _ in 0..10 {
        sys.tick();
    }
    // The child's output lands before anything the parent printed after
    // its wait completed.
    assert_eq!(drain(&mut sys), "cp");
    assert_eq!(sys.procs().live_count(), 0);
}

#[test]
fn fork_of_a_missing_program_yields_pid_zero() {
    let mut sys = system();
    install(
        &mut sys,
        "parent",
        &[
            op::STRING,
            b'n',
            b'o',
            0,
            op::FORK,
            op::PRINTLN,
            op::STOP,
        ],
    );
    sys.run_program("parent").unwrap();
    for _ in 0..4 {
        sys.tick();
    }
    assert_eq!(drain(&mut sys), "0\n");
}

#[test]
fn fault_terminates_only_the_faulting_process() {
    let mut sys = system();
    install(&mut sys, "bad", &[250]);
    install(&mut sys, "good", &[op::CHAR, b'g', op::PRINT, op::STOP]);
    sys.run_program("bad").unwrap();
    sys.run_program("good").unwrap();

    sys.tick();
    assert_eq!(sys.procs().live_count(), 1);
    for _ in 0..2 {
        sys.tick();
    }
    let out = drain(&mut sys);
    assert!(out.contains("Process 1 terminated: unknown opcode 250"));
    assert!(out.contains('g'));
}

#[test]
fn literal_overflow_kills_only_that_process() {
    let mut sys = system();
    let mut greedy = Vec::new();
    for _ in 0..11 {
        greedy.extend_from_slice(&[op::INT, 0, 1]);
    }
    install(&mut sys, "greedy", &greedy);
    install(&mut sys, "good", &[op::CHAR, b'g', op::PRINT, op::STOP]);
    sys.run_program("greedy").unwrap();
    sys.run_program("good").unwrap();

    for _ in 0..12 {
        sys.tick();
    }
    let out = drain(&mut sys);
    assert!(out.contains("Process 1 terminated: stack overflow"));
    assert!(out.contains('g'));
    assert_eq!(sys.procs().live_count(), 0);
}

#[test]
fn run_of_a_missing_program_is_reported() {
    let mut sys = system();
    run_line(&mut sys, "run nope");
    assert_eq!(drain(&mut sys), "Error: file not found\n");
}

#[test]
fn list_shows_pids_names_and_states() {
    let mut sys = system();
    install(&mut sys, "spin", &[op::LOOP, op::ENDLOOP]);
    sys.run_program("spin").unwrap();
    sys.run_program("spin").unwrap();
    run_line(&mut sys, "suspend 2");
    drain(&mut sys);

    run_line(&mut sys, "list");
    let listing = drain(&mut sys);
    assert!(listing.contains("2 of 10 process slots in use:"));
    assert!(listing.contains("1  spin  running"));
    assert!(listing.contains("2  spin  paused"));
}

#[test]
fn unknown_commands_are_reported() {
    let mut sys = system();
    run_line(&mut sys, "format");
    assert_eq!(drain(&mut sys), "Command \"format\" not found.\n");
}

#[test]
fn fork_child_pid_past_stack_range_reads_as_zero() {
    let mut sys = system();
    install(&mut sys, "halt", &[op::STOP]);
    // Burn through the 16-bit-representable pid range.
    for _ in 0..40_000 {
        sys.run_program("halt").unwrap();
        sys.tick();
        sys.tick();
    }
    install(
        &mut sys,
        "parent",
        &[
            op::STRING,
            b'h',
            b'a',
            b'l',
            b't',
            0,
            op::FORK,
            op::PRINTLN,
            op::STOP,
        ],
    );
    sys.run_program("parent").unwrap();
    drain(&mut sys);
    for _ in 0..5 {
        sys.tick();
    }
    // The child runs, but its pid cannot be encoded as a stack int.
    assert_eq!(drain(&mut sys), "0\n");
}

#[test]
fn pids_stay_unique_across_the_whole_session() {
    let mut sys = system();
    install(&mut sys, "halt", &[op::STOP]);
    let first = sys.run_program("halt").unwrap();
    sys.tick();
    sys.tick();
    let second = sys.run_program("halt").unwrap();
    assert_eq!(first, Pid(1));
    assert_eq!(second, Pid(2));
}
