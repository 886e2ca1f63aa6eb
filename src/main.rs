fn main() {
    qr_attendance_lib::run()
}
