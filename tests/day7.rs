use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn part1_output_right_answer() {
    let mut cmd = Command::cargo_bin("day7_part1").unwrap();
    cmd.arg("inputs/amp_chain.txt");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("43210").and(predicate::str::contains("[4, 3, 2, 1, 0]")));
}

#[test]
fn part2_output_right_answer() {
    let mut cmd = Command::cargo_bin("day7_part2").unwrap();
    cmd.arg("inputs/amp_loop.txt");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("139629729").and(predicate::str::contains("[9, 8, 7, 6, 5]")));
}
