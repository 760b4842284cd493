fn main() -> anyhow::Result<()> {
    bible_quiz_lib::run()
}
