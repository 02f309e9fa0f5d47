fn main() -> anyhow::Result<()> {
    flashcards_lib::run()
}
